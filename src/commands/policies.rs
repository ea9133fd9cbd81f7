// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

// Policy packages, firewall policies and package installation.

use anyhow::Result;
use serde_json::{json, Map, Value};

use super::{
    field_or, list_range, request_data, scope, specific_entity, split_field, CommandArgs, CommandOutput, Readable,
};
use crate::client::FortiClient;
use crate::error::FmError;
use crate::types::{Method, Payload};

const PACKAGE_HEADERS: &[&str] = &["name", "obj_ver", "type", "scope_member"];
const POLICY_HEADERS: &[&str] = &[
    "policyid", "name", "srcintf", "dstintf", "srcaddr", "dstaddr", "schedule", "service", "users", "action",
];
const TASK_HEADERS: &[&str] = &["id", "title", "adom", "percent", "line"];

/// Arguments folded into the `package settings` object, with their wire names
const PACKAGE_SETTINGS: &[(&str, &str)] = &[
    ("central_nat", "central-nat"),
    ("consolidated_firewall", "consolidated-firewall"),
    ("fwpolicy_implicit_log", "fwpolicy-implicit-log"),
    ("fwpolicy6_implicit_log", "fwpolicy6-implicit-log"),
    ("inspection_mode", "inspection-mode"),
    ("ngfw_mode", "ngfw-mode"),
    ("ssl_ssh_profile", "ssl-ssh-profile"),
];

fn package_root(scope: &str) -> String {
    format!("/pm/pkg/{scope}")
}

fn policy_url(scope: &str, package: &str) -> String {
    format!("/pm/config/{scope}/pkg/{package}/firewall/policy")
}

pub async fn list_policy_packages(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!(
        "{}{}",
        package_root(&scope(client, args)),
        specific_entity(args.get("policy_package"))
    );
    let packages = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table("FortiManager.PolicyPackage", "Policy Packages", PACKAGE_HEADERS, packages))
}

fn package_data(args: &CommandArgs) -> Map<String, Value> {
    let mut excluded: Vec<&str> = vec!["adom"];
    excluded.extend(PACKAGE_SETTINGS.iter().map(|(arg, _)| *arg));
    let mut data = request_data(args, &excluded);

    let settings: Map<String, Value> = PACKAGE_SETTINGS
        .iter()
        .filter_map(|(arg, wire)| args.get(arg).map(|v| (wire.to_string(), Value::String(v.to_string()))))
        .collect();
    if !settings.is_empty() {
        data.insert("package settings".to_string(), Value::Object(settings));
    }
    data
}

pub async fn create_policy_package(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = args.require("name")?;
    client
        .call(Method::Add, &package_root(&scope(client, args)), Payload::Item(package_data(args)))
        .await?;
    Ok(CommandOutput::Status(format!("Created new Policy Package {name}")))
}

pub async fn update_policy_package(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = args.require("name")?;
    client
        .call(Method::Update, &package_root(&scope(client, args)), Payload::Item(package_data(args)))
        .await?;
    Ok(CommandOutput::Status(format!("Updated Policy Package {name}")))
}

pub async fn delete_policy_package(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let pkg_path = args.require("pkg_path")?;
    let url = format!("{}/{pkg_path}", package_root(&scope(client, args)));
    client.call(Method::Delete, &url, Payload::None).await?;
    Ok(CommandOutput::Status(format!("Deleted Policy Package {pkg_path}")))
}

pub async fn list_policies(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let scope = scope(client, args);
    let package = args.require("package")?;
    let url = format!("{}{}", policy_url(&scope, package), specific_entity(args.get("policy_id")));
    let policies = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.PolicyPackage.Policy",
        format!("ADOM {scope} Policy Package {package} Policies"),
        POLICY_HEADERS,
        policies,
    ))
}

/// Fold `additional_params` (`field=value,field=value`) into the argument set
fn with_additional_params(args: &CommandArgs) -> Result<CommandArgs, FmError> {
    let mut merged = args.clone();
    if let Some(extra) = args.get("additional_params") {
        for pair in extra.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (field, value) = pair.split_once('=').ok_or_else(|| {
                FmError::Validation(format!("additional_params entry '{pair}' is not of the form field=value"))
            })?;
            merged.insert(field.trim(), value.trim());
        }
    }
    Ok(merged)
}

const POLICY_EXCLUDED: &[&str] = &["adom", "package", "additional_params"];

pub(crate) fn policy_create_data(args: &CommandArgs) -> Result<Map<String, Value>, FmError> {
    let merged = with_additional_params(args)?;
    let mut data = request_data(&merged, POLICY_EXCLUDED);

    split_field(&mut data, "dstaddr", "all", true);
    split_field(&mut data, "dstaddr6", "all", true);
    split_field(&mut data, "dstintf", "any", false);
    split_field(&mut data, "schedule", "always", false);
    split_field(&mut data, "service", "ALL", false);
    split_field(&mut data, "srcaddr", "all", true);
    split_field(&mut data, "srcaddr6", "all", true);
    split_field(&mut data, "srcintf", "any", false);

    if !(data.contains_key("dstaddr") || data.contains_key("dstaddr6")) {
        return Err(FmError::Validation(
            "Please enter 'dstaddr' or 'dstaddr6' command arguments".to_string(),
        ));
    }
    if !(data.contains_key("srcaddr") || data.contains_key("srcaddr6")) {
        return Err(FmError::Validation(
            "Please enter 'srcaddr' or 'srcaddr6' command arguments".to_string(),
        ));
    }
    Ok(data)
}

pub async fn create_policy(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let package = args.require("package")?;
    let data = policy_create_data(args)?;

    let created = client
        .call(
            Method::Add,
            &policy_url(&scope(client, args), package),
            Payload::Raw(Value::Object(data)),
        )
        .await?;

    Ok(CommandOutput::Status(format!(
        "Created policy with ID {}",
        field_or(&created, "policyid", "")
    )))
}

pub async fn update_policy(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let package = args.require("package")?;
    let merged = with_additional_params(args)?;
    let mut data = request_data(&merged, POLICY_EXCLUDED);
    for (field, default) in [
        ("dstaddr", "all"),
        ("dstaddr6", "all"),
        ("dstintf", "any"),
        ("schedule", "always"),
        ("service", "ALL"),
        ("srcaddr", "all"),
        ("srcaddr6", "all"),
        ("srcintf", "any"),
    ] {
        split_field(&mut data, field, default, true);
    }

    let updated = client
        .call(Method::Update, &policy_url(&scope(client, args), package), Payload::Item(data))
        .await?;

    Ok(CommandOutput::Status(format!(
        "Updated policy with ID {}",
        field_or(&updated, "policyid", args.get("policyid").unwrap_or_default())
    )))
}

pub async fn delete_policy(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let package = args.require("package")?;
    let policy = args.require("policy")?;
    let url = format!("{}/{policy}", policy_url(&scope(client, args), package));
    client.call(Method::Delete, &url, Payload::None).await?;
    Ok(CommandOutput::Status(format!("Deleted Policy {policy}")))
}

pub async fn move_policy(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let package = args.require("package")?;
    let policy = args.require("policy")?;
    let option = args.require("option")?;
    let target = args.require("target")?;

    let url = format!("{}/{policy}", policy_url(&scope(client, args), package));
    let options = request_data(args, &["adom", "package", "policy"]);
    client.call(Method::Move, &url, Payload::Extra(options)).await?;

    Ok(CommandOutput::Status(format!("Moved policy with ID {policy} {option} {target}")))
}

pub async fn install_policy_package(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let scope = scope(client, args);
    let package = args.require("package")?;
    let device = args.require("name")?;
    let vdom = args.get("vdom");

    let body = json!({
        "adom_rev_comment": args.get("adom_rev_comment"),
        "adom_rev_name": args.get("adom_rev_name"),
        "dev_rev_comment": args.get("dev_rev_comment"),
        "adom": scope.trim_start_matches("adom/"),
        "pkg": package,
        "scope": [{"name": device, "vdom": vdom}],
    });

    let response = client.call(Method::Exec, "/securityconsole/install/package", Payload::Raw(body)).await?;
    let task = response.get("task").cloned().unwrap_or(Value::Null);
    let task_text = match &task {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(CommandOutput::Results {
        prefix: "FortiManager.Installation",
        outputs: json!({"id": task}),
        readable: Readable::Text(format!(
            "Installed a policy package {package} in ADOM: {scope} on Device {device} on VDOM {}.\nTask ID: {task_text}",
            vdom.unwrap_or_default()
        )),
    })
}

pub async fn install_status(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let task_id = args.require("task_id")?;
    let task = client
        .call(Method::Get, &format!("/task/task/{task_id}"), Payload::None)
        .await?;

    Ok(CommandOutput::table(
        "FortiManager.Installation",
        format!("Installation Task {task_id} Status"),
        TASK_HEADERS,
        task,
    ))
}
