// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;

use super::{field_or, list_range, request_data, scope, specific_entity, split_field, CommandArgs, CommandOutput};
use crate::client::FortiClient;
use crate::types::{Method, Payload};

const CATEGORY_HEADERS: &[&str] = &["name", "comment"];
const GROUP_HEADERS: &[&str] = &["name", "member", "proxy", "comment"];
const CUSTOM_HEADERS: &[&str] = &["name", "category", "protocol", "iprange", "fqdn"];

fn service_url(scope: &str, kind: &str) -> String {
    format!("/pm/config/{scope}/obj/firewall/service/{kind}")
}

pub async fn list_service_categories(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!(
        "{}{}",
        service_url(&scope(client, args), "category"),
        specific_entity(args.get("service_category"))
    );
    let categories = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.ServiceCategory",
        "Service Categories",
        CATEGORY_HEADERS,
        categories,
    ))
}

pub async fn list_service_groups(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!(
        "{}{}",
        service_url(&scope(client, args), "group"),
        specific_entity(args.get("service_group"))
    );
    let groups = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table("FortiManager.ServiceGroup", "Service Groups", GROUP_HEADERS, groups))
}

async fn write_service_group(client: &FortiClient, args: &CommandArgs, method: Method) -> Result<String> {
    let mut data = request_data(args, &["adom"]);
    split_field(&mut data, "member", "", true);

    let written = client
        .call(method, &service_url(&scope(client, args), "group"), Payload::Item(data))
        .await?;
    Ok(field_or(&written, "name", args.get("name").unwrap_or_default()))
}

pub async fn create_service_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_service_group(client, args, Method::Add).await?;
    Ok(CommandOutput::Status(format!("Created new Service Group {name}")))
}

pub async fn update_service_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_service_group(client, args, Method::Update).await?;
    Ok(CommandOutput::Status(format!("Updated Service Group {name}")))
}

pub async fn delete_service_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let group = args.require("service_group")?;
    let url = format!("{}/{group}", service_url(&scope(client, args), "group"));
    client.call(Method::Delete, &url, Payload::None).await?;

    Ok(CommandOutput::Status(format!("Deleted Service Group {group}")))
}

pub async fn list_custom_services(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!(
        "{}{}",
        service_url(&scope(client, args), "custom"),
        specific_entity(args.get("custom_service"))
    );
    let services = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table("FortiManager.CustomService", "Custom Services", CUSTOM_HEADERS, services))
}

async fn write_custom_service(client: &FortiClient, args: &CommandArgs, method: Method) -> Result<String> {
    let data = request_data(args, &["adom"]);
    let written = client
        .call(method, &service_url(&scope(client, args), "custom"), Payload::Item(data))
        .await?;
    Ok(field_or(&written, "name", args.get("name").unwrap_or_default()))
}

pub async fn create_custom_service(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_custom_service(client, args, Method::Add).await?;
    Ok(CommandOutput::Status(format!("Created new Custom Service {name}")))
}

pub async fn update_custom_service(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_custom_service(client, args, Method::Update).await?;
    Ok(CommandOutput::Status(format!("Updated Custom Service {name}")))
}

pub async fn delete_custom_service(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let custom = args.require("custom")?;
    let url = format!("{}/{custom}", service_url(&scope(client, args), "custom"));
    client.call(Method::Delete, &url, Payload::None).await?;

    Ok(CommandOutput::Status(format!("Deleted Custom Service {custom}")))
}
