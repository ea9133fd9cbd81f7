// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

// Firewall addresses, address groups, dynamic interfaces and per-device
// dynamic address mappings.

use anyhow::Result;

use super::{field_or, list_range, request_data, scope, specific_entity, split_field, CommandArgs, CommandOutput};
use crate::client::FortiClient;
use crate::types::{Method, Payload};

const ADDRESS_HEADERS: &[&str] = &[
    "name", "type", "subnet", "start-ip", "end-ip", "fqdn", "wildcard", "country", "wildcard-fqdn",
];
const ADDRESS_GROUP_HEADERS: &[&str] = &["name", "member", "tagging", "allow-routing"];
const DYNAMIC_INTERFACE_HEADERS: &[&str] = &["name"];

fn address_url(scope: &str) -> String {
    format!("/pm/config/{scope}/obj/firewall/address")
}

fn address_group_url(scope: &str) -> String {
    format!("/pm/config/{scope}/obj/firewall/addrgrp")
}

fn dynamic_mapping_url(scope: &str, address: &str) -> String {
    format!("{}/{address}/dynamic_mapping", address_url(scope))
}

pub async fn list_addresses(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!("{}{}", address_url(&scope(client, args)), specific_entity(args.get("address")));
    let addresses = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.Address",
        "Firewall IPv4 Addresses",
        ADDRESS_HEADERS,
        addresses,
    ))
}

pub async fn create_address(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let data = request_data(args, &["adom"]);
    let created = client
        .call(Method::Add, &address_url(&scope(client, args)), Payload::Item(data))
        .await?;

    let name = field_or(&created, "name", args.get("name").unwrap_or_default());
    Ok(CommandOutput::Status(format!("Created new Address {name}")))
}

pub async fn update_address(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let data = request_data(args, &["adom"]);
    let updated = client
        .call(Method::Update, &address_url(&scope(client, args)), Payload::Item(data))
        .await?;

    let name = field_or(&updated, "name", args.get("name").unwrap_or_default());
    Ok(CommandOutput::Status(format!("Updated Address {name}")))
}

pub async fn delete_address(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let address = args.require("address")?;
    let url = format!("{}/{address}", address_url(&scope(client, args)));
    client.call(Method::Delete, &url, Payload::None).await?;

    Ok(CommandOutput::Status(format!("Deleted Address {address}")))
}

pub async fn list_address_groups(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let url = format!(
        "{}{}",
        address_group_url(&scope(client, args)),
        specific_entity(args.get("address_group"))
    );
    let groups = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.AddressGroup",
        "Firewall IPv4 Address Groups",
        ADDRESS_GROUP_HEADERS,
        groups,
    ))
}

async fn write_address_group(client: &FortiClient, args: &CommandArgs, method: Method) -> Result<String> {
    let mut data = request_data(args, &["adom"]);
    split_field(&mut data, "member", "", true);

    let written = client
        .call(method, &address_group_url(&scope(client, args)), Payload::Item(data))
        .await?;
    Ok(field_or(&written, "name", args.get("name").unwrap_or_default()))
}

pub async fn create_address_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_address_group(client, args, Method::Add).await?;
    Ok(CommandOutput::Status(format!("Created new Address Group {name}")))
}

pub async fn update_address_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let name = write_address_group(client, args, Method::Update).await?;
    Ok(CommandOutput::Status(format!("Updated Address Group {name}")))
}

pub async fn delete_address_group(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let group = args.require("address_group")?;
    let url = format!("{}/{group}", address_group_url(&scope(client, args)));
    client.call(Method::Delete, &url, Payload::None).await?;

    Ok(CommandOutput::Status(format!("Deleted Address Group {group}")))
}

pub async fn list_dynamic_interfaces(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let scope = scope(client, args);
    let url = format!("/pm/config/{scope}/obj/dynamic/interface");
    let interfaces = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.DynamicInterface",
        format!("ADOM {scope} Dynamic Interfaces"),
        DYNAMIC_INTERFACE_HEADERS,
        interfaces,
    ))
}

pub async fn list_dynamic_mappings(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let address = args.require("address")?;
    let url = format!(
        "{}{}",
        dynamic_mapping_url(&scope(client, args), address),
        specific_entity(args.get("dynamic_mapping"))
    );
    let mappings = client.call(Method::Get, &url, list_range(args)?).await?;

    Ok(CommandOutput::table(
        "FortiManager.Address.DynamicMapping",
        format!("Address {address} Dynamic Mapping"),
        ADDRESS_HEADERS,
        mappings,
    ))
}

async fn write_dynamic_mapping(client: &FortiClient, args: &CommandArgs, method: Method) -> Result<String> {
    let address = args.require("address")?;
    let data = request_data(args, &["adom", "address"]);
    client
        .call(method, &dynamic_mapping_url(&scope(client, args), address), Payload::Item(data))
        .await?;
    Ok(address.to_string())
}

pub async fn create_dynamic_mapping(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let address = write_dynamic_mapping(client, args, Method::Add).await?;
    Ok(CommandOutput::Status(format!("Created new dynamic mapping in address {address}")))
}

pub async fn update_dynamic_mapping(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let address = write_dynamic_mapping(client, args, Method::Update).await?;
    Ok(CommandOutput::Status(format!("Updated dynamic mapping in address {address}")))
}

pub async fn delete_dynamic_mapping(client: &FortiClient, args: &CommandArgs) -> Result<CommandOutput> {
    let address = args.require("address")?;
    let mapping = args.require("dynamic_mapping")?;
    let url = format!("{}/{mapping}", dynamic_mapping_url(&scope(client, args), address));
    client.call(Method::Delete, &url, Payload::None).await?;

    Ok(CommandOutput::Status(format!(
        "Deleted dynamic mapping {mapping} in address {address}"
    )))
}
