/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */


//! Custom principal commands.

use super::{print_json, Context};
use anyhow::{bail, Result};
use sshca::principals::PrincipalAction;
use sshca::validation::parse_principal_list;

pub async fn get(ctx: &Context, username: &str) -> Result<()> {
    let principals = ctx
        .engine
        .get_principals(&ctx.credentials, username)
        .await?;
    println!("{}", principals.join(","));
    Ok(())
}

fn parse_action(action: &str, principals: &str) -> Result<PrincipalAction> {
    Ok(match action {
        "add" => PrincipalAction::Add(parse_principal_list(principals)?),
        "remove" => PrincipalAction::Remove(parse_principal_list(principals)?),
        "update" => PrincipalAction::Update(parse_principal_list(principals)?),
        "purge" => PrincipalAction::Purge,
        other => bail!("Unknown principals action '{}'", other),
    })
}

pub async fn edit(ctx: &Context, username: &str, action: &str, principals: &str) -> Result<()> {
    let action = parse_action(action, principals)?;
    let outcome = ctx
        .engine
        .manage_principals(&ctx.credentials, username, action)
        .await?;
    println!("{}", outcome);
    Ok(())
}

pub async fn search(ctx: &Context, filter: &str) -> Result<()> {
    let found = ctx
        .engine
        .search_principals(&ctx.credentials, filter)
        .await?;
    print_json(&found)
}
