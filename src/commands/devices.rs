// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;

use super::{scope, specific_entity, CommandArgs, CommandOutput};
use crate::client::FortiClient;
use crate::types::{Method, Payload};

const DEVICE_HEADERS: &[&str] = &["name", "ip", "hostname", "os_type", "adm_usr", "app_ver", "vdom", "ha_mode"];
const GROUP_HEADERS: &[&str] = &["name", "type", "os_type"];

/// Connectivity check: list devices in the configured ADOM
pub async fn test_module(client: &FortiClient, _args: &CommandArgs) -> Result<CommandOutput> {
    list_devices(client, &CommandArgs::new()).await?;
    Ok(CommandOutput::Status("ok".to_string()))
}

pub async fn list_devices(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let scope = scope(client, args);
    let url = format!("/dvmdb/{scope}/device{}", specific_entity(args.get("device")));
    let devices = client.call(Method::Get, &url, Payload::None).await?;

    Ok(CommandOutput::table(
        "FortiManager.Device",
        format!("ADOM {scope} Devices"),
        DEVICE_HEADERS,
        devices,
    ))
}

pub async fn list_device_groups(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let scope = scope(client, args);
    let url = format!("/dvmdb/{scope}/group{}", specific_entity(args.get("group")));
    let groups = client.call(Method::Get, &url, Payload::None).await?;

    Ok(CommandOutput::table(
        "FortiManager.DeviceGroup",
        format!("ADOM {scope} Device Groups"),
        GROUP_HEADERS,
        groups,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::*;
    use crate::commands::Readable;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_single_device_in_named_adom() {
        let transport = ScriptedTransport::new(vec![ok(json!({"name": "fw1", "ip": "10.0.0.1"}))]);
        let (client, _store) = client_with(transport.clone(), Some("tok"));

        let args = CommandArgs::from([("adom", "branch"), ("device", "fw1")]);
        let output = list_devices(&client, &args).await.unwrap();

        assert_eq!(transport.sent()[0]["params"][0]["url"], "/dvmdb/adom/branch/device/fw1");
        match output {
            CommandOutput::Results { prefix, outputs, readable, .. } => {
                assert_eq!(prefix, "FortiManager.Device");
                assert_eq!(outputs["name"], "fw1");
                assert_eq!(
                    readable,
                    Readable::Table {
                        title: "ADOM adom/branch Devices".to_string(),
                        headers: DEVICE_HEADERS,
                    }
                );
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_module_reports_ok() {
        let transport = ScriptedTransport::new(vec![ok(json!([]))]);
        let (client, _store) = client_with(transport.clone(), Some("tok"));

        let output = test_module(&client, &CommandArgs::new()).await.unwrap();

        assert_eq!(output, CommandOutput::Status("ok".to_string()));
        assert_eq!(transport.sent()[0]["params"][0]["url"], "/dvmdb/adom/root/device");
    }

    #[tokio::test]
    async fn test_global_device_groups() {
        let transport = ScriptedTransport::new(vec![ok(json!([{"name": "All_FortiGate"}]))]);
        let (client, _store) = client_with(transport.clone(), Some("tok"));

        list_device_groups(&client, &CommandArgs::from([("adom", "global")]))
            .await
            .unwrap();

        assert_eq!(transport.sent()[0]["params"][0]["url"], "/dvmdb/global/group");
    }
}
