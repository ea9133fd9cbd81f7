// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

// Command table for the FortiManager integration.
// Each command is one handler translating flat key=value arguments into a
// single dispatcher call plus output shaping.

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::client::FortiClient;
use crate::error::FmError;
use crate::types::Payload;

mod addresses;
mod devices;
mod policies;
mod services;

/// Uniform handler signature shared by every command
pub type Handler =
    for<'a> fn(&'a FortiClient, &'a CommandArgs) -> BoxFuture<'a, Result<CommandOutput>>;

/// Named arguments as given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    values: BTreeMap<String, String>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs; the value may itself contain `=`.
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> Result<Self, FmError> {
        let mut args = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                FmError::Validation(format!("Argument '{pair}' is not of the form key=value"))
            })?;
            if key.is_empty() {
                return Err(FmError::Validation(format!("Argument '{pair}' has an empty name")));
            }
            args.insert(key, value);
        }
        Ok(args)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Present and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, FmError> {
        self.get(key)
            .ok_or_else(|| FmError::Validation(format!("Missing required argument '{key}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CommandArgs {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut args = Self::new();
        for (key, value) in pairs {
            args.insert(key, value);
        }
        args
    }
}

/// How a result is shown in table mode
#[derive(Debug, Clone, PartialEq)]
pub enum Readable {
    Table {
        title: String,
        headers: &'static [&'static str],
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// Structured outputs under a context prefix, e.g. `FortiManager.Device`
    Results {
        prefix: &'static str,
        outputs: Value,
        readable: Readable,
    },
    /// Plain status line
    Status(String),
}

impl CommandOutput {
    pub fn table(
        prefix: &'static str,
        title: impl Into<String>,
        headers: &'static [&'static str],
        outputs: Value,
    ) -> Self {
        CommandOutput::Results {
            prefix,
            outputs,
            readable: Readable::Table {
                title: title.into(),
                headers,
            },
        }
    }
}

/// Name -> handler table, built once per process
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl CommandRegistry {
    pub fn load() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };

        registry.register("test-module", |c, a| Box::pin(devices::test_module(c, a)));

        registry.register("fortimanager-devices-list", |c, a| Box::pin(devices::list_devices(c, a)));
        registry.register("fortimanager-device-groups-list", |c, a| {
            Box::pin(devices::list_device_groups(c, a))
        });

        registry.register("fortimanager-address-list", |c, a| Box::pin(addresses::list_addresses(c, a)));
        registry.register("fortimanager-address-create", |c, a| Box::pin(addresses::create_address(c, a)));
        registry.register("fortimanager-address-update", |c, a| Box::pin(addresses::update_address(c, a)));
        registry.register("fortimanager-address-delete", |c, a| Box::pin(addresses::delete_address(c, a)));
        registry.register("fortimanager-address-group-list", |c, a| {
            Box::pin(addresses::list_address_groups(c, a))
        });
        registry.register("fortimanager-address-group-create", |c, a| {
            Box::pin(addresses::create_address_group(c, a))
        });
        registry.register("fortimanager-address-group-update", |c, a| {
            Box::pin(addresses::update_address_group(c, a))
        });
        registry.register("fortimanager-address-group-delete", |c, a| {
            Box::pin(addresses::delete_address_group(c, a))
        });
        registry.register("fortimanager-dynamic-interface-list", |c, a| {
            Box::pin(addresses::list_dynamic_interfaces(c, a))
        });
        registry.register("fortimanager-dynamic-address-mappings-list", |c, a| {
            Box::pin(addresses::list_dynamic_mappings(c, a))
        });
        registry.register("fortimanager-dynamic-address-mappings-create", |c, a| {
            Box::pin(addresses::create_dynamic_mapping(c, a))
        });
        registry.register("fortimanager-dynamic-address-mappings-update", |c, a| {
            Box::pin(addresses::update_dynamic_mapping(c, a))
        });
        registry.register("fortimanager-dynamic-address-mapping-delete", |c, a| {
            Box::pin(addresses::delete_dynamic_mapping(c, a))
        });

        registry.register("fortimanager-service-categories-list", |c, a| {
            Box::pin(services::list_service_categories(c, a))
        });
        registry.register("fortimanager-service-group-list", |c, a| {
            Box::pin(services::list_service_groups(c, a))
        });
        registry.register("fortimanager-service-group-create", |c, a| {
            Box::pin(services::create_service_group(c, a))
        });
        registry.register("fortimanager-service-group-update", |c, a| {
            Box::pin(services::update_service_group(c, a))
        });
        registry.register("fortimanager-service-group-delete", |c, a| {
            Box::pin(services::delete_service_group(c, a))
        });
        registry.register("fortimanager-custom-service-list", |c, a| {
            Box::pin(services::list_custom_services(c, a))
        });
        registry.register("fortimanager-custom-service-create", |c, a| {
            Box::pin(services::create_custom_service(c, a))
        });
        registry.register("fortimanager-custom-service-update", |c, a| {
            Box::pin(services::update_custom_service(c, a))
        });
        registry.register("fortimanager-custom-service-delete", |c, a| {
            Box::pin(services::delete_custom_service(c, a))
        });

        registry.register("fortimanager-firewall-policy-package-list", |c, a| {
            Box::pin(policies::list_policy_packages(c, a))
        });
        registry.register("fortimanager-firewall-policy-package-create", |c, a| {
            Box::pin(policies::create_policy_package(c, a))
        });
        registry.register("fortimanager-firewall-policy-package-update", |c, a| {
            Box::pin(policies::update_policy_package(c, a))
        });
        registry.register("fortimanager-firewall-policy-package-delete", |c, a| {
            Box::pin(policies::delete_policy_package(c, a))
        });
        registry.register("fortimanager-firewall-policy-list", |c, a| Box::pin(policies::list_policies(c, a)));
        registry.register("fortimanager-firewall-policy-create", |c, a| Box::pin(policies::create_policy(c, a)));
        registry.register("fortimanager-firewall-policy-update", |c, a| Box::pin(policies::update_policy(c, a)));
        registry.register("fortimanager-firewall-policy-delete", |c, a| Box::pin(policies::delete_policy(c, a)));
        registry.register("fortimanager-firewall-policy-move", |c, a| Box::pin(policies::move_policy(c, a)));
        registry.register("fortimanager-firewall-policy-package-install", |c, a| {
            Box::pin(policies::install_policy_package(c, a))
        });
        registry.register("fortimanager-firewall-policy-package-install-status", |c, a| {
            Box::pin(policies::install_status(c, a))
        });

        registry
    }

    fn register(&mut self, name: &'static str, handler: Handler) {
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    /// Sorted, for help output
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn execute(
        &self,
        name: &str,
        client: &FortiClient,
        args: &CommandArgs,
    ) -> Result<CommandOutput> {
        let handler = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown command '{}'. Run 'fmctl commands' to list them", name))?;
        handler(client, args).await
    }
}

// Shared argument helpers

/// ADOM scope for this invocation: the `adom` argument wins over the configured one
pub(crate) fn scope(client: &FortiClient, args: &CommandArgs) -> String {
    client.scope(args.get("adom"))
}

/// `/<name>` when an entity is named, empty otherwise
pub(crate) fn specific_entity(name: Option<&str>) -> String {
    name.map(|n| format!("/{n}")).unwrap_or_default()
}

/// Request data from every argument not in `excluded`, with `_` turned into `-`
pub(crate) fn request_data(args: &CommandArgs, excluded: &[&str]) -> Map<String, Value> {
    args.iter()
        .filter(|(key, _)| !excluded.contains(key))
        .map(|(key, value)| (key.replace('_', "-"), Value::String(value.to_string())))
        .collect()
}

/// `from`/`to` (inclusive) as a half-open result window
pub(crate) fn list_range(args: &CommandArgs) -> Result<Payload, FmError> {
    let from = parse_index(args, "from")?;
    let to = parse_index(args, "to")?;

    let to = to
        .map(|t| {
            t.checked_add(1)
                .ok_or_else(|| FmError::Validation("Argument 'to' is out of range".to_string()))
        })
        .transpose()?;

    Ok(match (from, to) {
        (None, None) => Payload::None,
        (from, to) => Payload::Range {
            from: from.unwrap_or(0),
            to,
        },
    })
}

fn parse_index(args: &CommandArgs, key: &str) -> Result<Option<u64>, FmError> {
    args.get(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                FmError::Validation(format!("Argument '{key}' must be a non-negative integer, got '{raw}'"))
            })
        })
        .transpose()
}

/// Turn a comma-separated field into a list. Absent fields get `[default]`
/// unless `skip_if_absent` is set.
pub(crate) fn split_field(data: &mut Map<String, Value>, name: &str, default: &str, skip_if_absent: bool) {
    let current = data
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let raw = match current {
        Some(value) => value,
        None if skip_if_absent => return,
        None => default.to_string(),
    };

    let items = raw
        .split(',')
        .map(|item| Value::String(item.trim().to_string()))
        .collect();
    data.insert(name.to_string(), Value::Array(items));
}

/// Read a string field off a returned object, falling back to a default
pub(crate) fn field_or(data: &Value, key: &str, fallback: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}
