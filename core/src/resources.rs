//! Groups, policies and tenants.
//!
//! These share the users' contract and differ only in resource name and
//! relations.

use serde_json::Value;

use crate::command::{resource_url, Query, ResourceCommand};
use crate::error::Result;
use crate::http::Transport;

macro_rules! resource_command {
    ($(#[$meta:meta])* $name:ident, $resource:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name<T> {
            base_url: String,
            transport: T,
        }

        impl<T: Transport> ResourceCommand for $name<T> {
            const RESOURCE: &'static str = $resource;

            type Transport = T;

            fn base_url(&self) -> &str {
                &self.base_url
            }

            fn transport(&self) -> &T {
                &self.transport
            }
        }

        impl<T: Transport> $name<T> {
            pub fn from_root(root: &str, transport: T) -> Self {
                Self {
                    base_url: resource_url(root, Self::RESOURCE),
                    transport,
                }
            }
        }
    };
}

resource_command!(
    /// The `groups` resource.
    GroupsCommand,
    "groups"
);
resource_command!(
    /// The `policies` resource; generic CRUD only.
    PoliciesCommand,
    "policies"
);
resource_command!(
    /// The `tenants` resource.
    TenantsCommand,
    "tenants"
);

impl<T: Transport> GroupsCommand<T> {
    pub fn get_users(
        &self,
        group_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("users", group_uuid, tenant_uuid, query)
    }

    pub fn get_policies(
        &self,
        group_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("policies", group_uuid, tenant_uuid, query)
    }

    pub fn add_user(
        &self,
        group_uuid: &str,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.associate(group_uuid, "users", user_uuid, tenant_uuid)
    }

    pub fn remove_user(
        &self,
        group_uuid: &str,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.dissociate(group_uuid, "users", user_uuid, tenant_uuid)
    }

    pub fn add_policy(
        &self,
        group_uuid: &str,
        policy_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.associate(group_uuid, "policies", policy_uuid, tenant_uuid)
    }

    pub fn remove_policy(
        &self,
        group_uuid: &str,
        policy_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.dissociate(group_uuid, "policies", policy_uuid, tenant_uuid)
    }
}

impl<T: Transport> TenantsCommand<T> {
    pub fn get_users(&self, tenant_uuid: &str, query: &Query) -> Result<Value> {
        self.get_relation("users", tenant_uuid, None, query)
    }

    pub fn get_policies(&self, tenant_uuid: &str, query: &Query) -> Result<Value> {
        self.get_relation("policies", tenant_uuid, None, query)
    }
}
