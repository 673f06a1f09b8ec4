//! Basic usage example: naming lookup, a stateless business call and an
//! entity bean reached through its home.
//!
//! Run with: `cargo run --example basic_usage`
//!
//! Requires an application server accepting `ejbd` connections on
//! localhost:4201 with the `CalculatorRemote` and `AccountHome` beans
//! deployed.

use std::time::Duration;

use ejb_client::{
    ClientConfigBuilder, EjbClient, FindResult, InterfaceDescriptor, MethodDescriptor, Value,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== EJB Client Basic Usage Example ===\n");

    let config = ClientConfigBuilder::new()
        .provider_url("failover:sticky:ejbd://127.0.0.1:4201,ejbd://127.0.0.1:4202")
        .connect_timeout(Duration::from_secs(5))
        .credentials("guest", "guest")
        .build()?;

    let client = EjbClient::new(config)?;
    client.register_interface(
        InterfaceDescriptor::business("org.acme.Calculator")
            .with_method(MethodDescriptor::new("add", ["int", "int"]))
            .with_method(MethodDescriptor::new("report", ["int"]).asynchronous()),
    );
    client.register_interface(
        InterfaceDescriptor::legacy("org.acme.AccountHome")
            .with_method(MethodDescriptor::new("create", ["java.lang.String"]))
            .with_method(MethodDescriptor::new("findByOwner", ["java.lang.String"])),
    );
    client.register_interface(
        InterfaceDescriptor::legacy("org.acme.Account")
            .with_method(MethodDescriptor::new("deposit", ["long"]))
            .with_method(MethodDescriptor::new("balance", Vec::<String>::new())),
    );

    println!("Connecting naming context...");
    let context = client.initial_context().await?;
    println!("Authenticated against {}\n", context.server()?);

    // ========== Stateless business interface ==========
    println!("--- Business interface ---\n");

    let calculator = context.lookup_object("CalculatorRemote").await?;
    let sum = calculator.invoke("add", vec![1.into(), 2.into()]).await?;
    println!("add(1, 2) = {}", sum);

    let pending = calculator.invoke_async("report", vec![7.into()]).await?;
    println!("Submitted asynchronous report, request id {}", pending.request_id());
    println!("report(7) = {}", pending.get().await?);

    // ========== Entity bean via home ==========
    println!("\n--- Home interface ---\n");

    let home = context.lookup_home("AccountHome").await?;
    let account = home.create(vec![Value::from("alice")]).await?;
    account.invoke("deposit", vec![Value::Long(250)]).await?;
    println!("Balance: {}", account.invoke("balance", vec![]).await?);

    match home.find("findByOwner", vec![Value::from("alice")]).await? {
        FindResult::One(found) => println!("Found account {}", found.get_primary_key().await?),
        FindResult::Many(found) => println!("Found {} accounts", found.len()),
        FindResult::None => println!("No account found"),
    }

    account.remove().await?;
    println!("Account removed, reference valid: {}", account.is_valid());

    context.close().await?;
    println!("\n=== Example completed successfully ===");
    Ok(())
}
