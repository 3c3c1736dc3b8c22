use std::collections::HashMap;

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::tenancy::{Role, TenantId};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "User id (random when omitted)")]
    pub user: Option<Uuid>,

    #[arg(long = "tenant", value_parser = parse_membership, help = "Membership as <tenant-uuid>=<member|teacher|staff|admin>; repeatable")]
    pub tenants: Vec<(TenantId, Role)>,

    #[arg(long, help = "Active tenant claim")]
    pub active: Option<TenantId>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let user_id = args.user.unwrap_or_else(Uuid::new_v4);
    let tenants: HashMap<TenantId, Role> = args.tenants.into_iter().collect();
    if let Some(active) = args.active {
        if !tenants.contains_key(&active) {
            anyhow::bail!("active tenant {} is not among the --tenant memberships", active);
        }
    }

    let claims = Claims::new(user_id, tenants, args.active);
    let token = generate_jwt(&claims)?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({"token": token, "user_id": user_id, "exp": claims.exp})),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}

fn parse_membership(raw: &str) -> Result<(TenantId, Role), String> {
    let (tenant, role) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <tenant-uuid>=<role>, got '{}'", raw))?;
    let tenant = Uuid::parse_str(tenant.trim()).map_err(|e| format!("invalid tenant id '{}': {}", tenant, e))?;
    let role = Role::parse(role).ok_or_else(|| format!("unknown role '{}'", role))?;
    Ok((tenant, role))
}
