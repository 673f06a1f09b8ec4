//! Per-component-type behavior of proxies.

use ejb_core::{BufferOutput, ComponentType, ObjectCodec, Result, Value};

/// What distinguishes entity, stateful and stateless proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanPolicy {
    /// Entity beans: findable, identified by deployment and primary key.
    Entity,
    /// Stateful session beans: identified by the session's primary key.
    Stateful,
    /// Stateless and singleton session beans: no instance identity.
    Stateless,
}

impl BeanPolicy {
    /// Returns the policy for a component type.
    pub fn for_component(component: ComponentType) -> Self {
        match component {
            ComponentType::BmpEntity | ComponentType::CmpEntity => BeanPolicy::Entity,
            ComponentType::Stateful => BeanPolicy::Stateful,
            ComponentType::Stateless | ComponentType::Singleton => BeanPolicy::Stateless,
        }
    }

    /// Returns true if home finders may be called.
    pub fn allows_find(&self) -> bool {
        matches!(self, BeanPolicy::Entity)
    }

    /// Returns true if the home may remove by primary key.
    pub fn allows_remove_by_primary_key(&self) -> bool {
        matches!(self, BeanPolicy::Entity)
    }

    /// Returns true if remove-by-handle must check the handle's deployment.
    pub fn checks_handle_deployment(&self) -> bool {
        matches!(self, BeanPolicy::Stateful | BeanPolicy::Entity)
    }

    /// Computes the registry key of an object proxy.
    ///
    /// Stateless proxies have none and are never grouped.
    pub fn identity_key(
        &self,
        codec: &ObjectCodec,
        deployment_id: &str,
        primary_key: &Value,
    ) -> Result<Option<IdentityKey>> {
        let key = match self {
            BeanPolicy::Entity => Some(IdentityKey {
                deployment_id: Some(deployment_id.to_string()),
                primary_key: key_bytes(codec, primary_key)?,
            }),
            BeanPolicy::Stateful => Some(IdentityKey {
                deployment_id: None,
                primary_key: key_bytes(codec, primary_key)?,
            }),
            BeanPolicy::Stateless => None,
        };
        Ok(key)
    }
}

/// Key under which live proxies are grouped for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    deployment_id: Option<String>,
    primary_key: Vec<u8>,
}

impl IdentityKey {
    /// Returns the deployment part, present for entities.
    pub fn deployment_id(&self) -> Option<&str> {
        self.deployment_id.as_deref()
    }
}

/// Encodes a primary key into comparable bytes.
pub(crate) fn key_bytes(codec: &ObjectCodec, primary_key: &Value) -> Result<Vec<u8>> {
    let mut out = BufferOutput::with_capacity(32);
    codec.write_value(&mut out, primary_key)?;
    Ok(out.into_bytes())
}
