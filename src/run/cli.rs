use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;

use super::{expand_home, flag_value, positionals};
use crate::config::Config;
use crate::db::{Database, LimitFilter};
use crate::models::{Actor, IncreaseRequest, LimitStatus, PurchaseOrder, RequestStatus, Role, UserLimit};
use crate::util::{format_amount, parse_amount};
use crate::{admin, export, gate, usage, workflow};

pub(crate) fn as_cli(args: &[String], config: &Config, db: &mut Database) -> Result<()> {
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };
    let rest = &args[2..];

    match command.as_str() {
        "limits" | "ls" => cli_limits(rest, db),
        "show" => cli_show(rest, db),
        "evaluate" | "eval" => cli_evaluate(rest, db),
        "set" => cli_set(rest, config, db),
        "revoke" => cli_set_status(rest, config, db, LimitStatus::Revoked),
        "reinstate" => cli_set_status(rest, config, db, LimitStatus::Active),
        "request" => cli_request(rest, config, db),
        "pending" => {
            let pending = workflow::list_pending(db)?;
            if pending.is_empty() {
                println!("No pending requests");
                return Ok(());
            }
            print_request_table(&pending);
            Ok(())
        }
        "requests" => {
            let status = match flag_value(rest, "--status") {
                Some(s) => Some(
                    RequestStatus::parse(s)
                        .ok_or_else(|| anyhow::anyhow!("Unknown request status: {s}"))?,
                ),
                None => None,
            };
            cli_requests(db, status)
        }
        "show-request" => cli_show_request(rest, db),
        "approve" => cli_approve(rest, config, db),
        "reject" => cli_reject(rest, config, db),
        "submit-po" => cli_submit_po(rest, config, db),
        "cancel-po" => cli_cancel_po(rest, db),
        "provision" => cli_provision(rest, db),
        "grant" => cli_grant(rest, config, db),
        "revoke-role" => cli_revoke_role(rest, config, db),
        "users" => cli_users(db),
        "recompute-usage" => {
            let count = usage::recompute_monthly_usage(db, today())?;
            println!("Updated monthly usage for {count} user limit(s)");
            Ok(())
        }
        "export" => cli_export(rest, db),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("polimit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("polimit - purchase order spending limits");
    println!();
    println!("Usage: polimit <command> [--as <user>]");
    println!();
    println!("Limits:");
    println!("  limits [--user u] [--company c] [--status s]   List user limits");
    println!("  show <user> <company>                          Show one user's limit");
    println!("  evaluate <user> <company> <amount>             Check a PO amount");
    println!("  set <user> <company> <per_po> <per_month>      Set limits directly (approver)");
    println!("    --status <Active|Revoked>                    Status to set (default: Active)");
    println!("  revoke <user> <company>                        Revoke a limit (approver)");
    println!("  reinstate <user> <company>                     Reinstate a limit (approver)");
    println!("  provision <user> <company...>                  Create revoked zero limits");
    println!();
    println!("Increase requests:");
    println!("  request <company> <per_po> <per_month>         Request higher limits");
    println!("    --reason <text>                              Justification");
    println!("  pending                                        List pending requests");
    println!("  requests [--status s]                          List all requests");
    println!("  show-request <id>                              Show one request");
    println!("  approve <id>                                   Approve a request (approver)");
    println!("  reject <id> <reason...>                        Reject a request (approver)");
    println!();
    println!("Purchase orders:");
    println!("  submit-po <name> <company> <amount>            Submit a PO through the limit gate");
    println!("    --date <YYYY-MM-DD>                          Transaction date (default: today)");
    println!("  cancel-po <name>                               Cancel a submitted PO");
    println!("  recompute-usage                                Rebuild this month's usage");
    println!();
    println!("Roles and data:");
    println!("  grant <user> <role>                            Grant a role");
    println!("  revoke-role <user> <role>                      Remove a role");
    println!("  users                                          List users with PO roles");
    println!("  export [path]                                  Export limits to CSV");
    println!();
    println!("  --as <user>                                    Acting user (default: $POLIMIT_USER, $USER)");
    println!("  --help, -h                                     Show this help");
    println!("  --version, -V                                  Show version");
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn acting_actor(args: &[String], config: &Config, db: &Database) -> Result<Actor> {
    let user = flag_value(args, "--as")
        .map(str::to_string)
        .or_else(|| config.user.clone())
        .ok_or_else(|| anyhow::anyhow!("No acting user: pass --as <user> or set POLIMIT_USER"))?;
    Ok(db.load_actor(&user)?)
}

fn amount_arg(value: Option<&&str>, name: &str) -> Result<Decimal> {
    let raw = value.ok_or_else(|| anyhow::anyhow!("Missing {name}"))?;
    parse_amount(raw).ok_or_else(|| anyhow::anyhow!("Invalid {name}: {raw}"))
}

fn user_company<'a>(pos: &[&'a str], usage: &str) -> Result<(&'a str, &'a str)> {
    match pos {
        [user, company, ..] => Ok((*user, *company)),
        _ => anyhow::bail!("Usage: {usage}"),
    }
}

fn print_limit_table(limits: &[UserLimit]) {
    println!(
        "{:<20} {:<20} {:<8} {:>14} {:>14} {:>14}",
        "User", "Company", "Status", "Per PO", "Per Month", "Used"
    );
    println!("{}", "─".repeat(95));
    for l in limits {
        println!(
            "{:<20} {:<20} {:<8} {:>14} {:>14} {:>14}",
            l.user,
            l.company,
            l.status,
            format_amount(l.per_po_limit),
            format_amount(l.per_month_limit),
            format_amount(l.monthly_usage),
        );
    }
}

fn print_request_table(requests: &[IncreaseRequest]) {
    println!(
        "{:<5} {:<16} {:<16} {:>14} {:>14} {:<17} Reason",
        "ID", "User", "Company", "Per PO", "Per Month", "Status"
    );
    println!("{}", "─".repeat(100));
    for r in requests {
        let note = r.rejection_reason.as_deref().unwrap_or(&r.reason);
        println!(
            "{:<5} {:<16} {:<16} {:>14} {:>14} {:<17} {}",
            r.id.unwrap_or(0),
            r.user,
            r.company,
            format_amount(r.requested_per_po_limit),
            format_amount(r.requested_per_month_limit),
            r.status,
            note,
        );
    }
}

fn cli_limits(args: &[String], db: &Database) -> Result<()> {
    let status = match flag_value(args, "--status") {
        Some(s) => Some(
            LimitStatus::parse_strict(s).ok_or_else(|| anyhow::anyhow!("Unknown status: {s}"))?,
        ),
        None => None,
    };
    let filter = LimitFilter {
        user: flag_value(args, "--user").map(str::to_string),
        company: flag_value(args, "--company").map(str::to_string),
        status,
    };
    let limits = db.list_user_limits(&filter)?;
    if limits.is_empty() {
        println!("No user limits");
        return Ok(());
    }
    print_limit_table(&limits);
    Ok(())
}

fn cli_show(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args);
    let (user, company) = user_company(&pos, "polimit show <user> <company>")?;

    match db.get_user_limit(user, company)? {
        Some(l) => {
            println!("{user} @ {company}");
            println!("{}", "─".repeat(40));
            println!("  Status:        {}", l.status);
            println!("  Per PO:        {}", format_amount(l.per_po_limit));
            println!("  Per Month:     {}", format_amount(l.per_month_limit));
            println!("  Used (month):  {}", format_amount(l.monthly_usage));
            println!("  Since:         {}", l.last_reset_date);
            if let Some(by) = &l.last_updated_by {
                println!(
                    "  Updated by:    {by} ({})",
                    l.last_updated_at.as_deref().unwrap_or("")
                );
            }
        }
        None => println!("No PO limit for {user} in {company}"),
    }
    Ok(())
}

fn cli_evaluate(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args);
    let (user, company) = user_company(&pos, "polimit evaluate <user> <company> <amount>")?;
    let amount = amount_arg(pos.get(2), "amount")?;

    let result = gate::check(db, user, company, amount)?;
    println!("{}: {}", result.title, result.code);
    println!("{}", result.explanation);
    if !result.enabled {
        println!("Submission disabled. Use `polimit request {company} <per_po> <per_month>` to ask for a higher limit.");
    }
    Ok(())
}

fn cli_set(args: &[String], config: &Config, db: &Database) -> Result<()> {
    let pos = positionals(args);
    let usage = "polimit set <user> <company> <per_po> <per_month> [--status s]";
    let (user, company) = user_company(&pos, usage)?;
    let per_po = amount_arg(pos.get(2), "per PO limit")?;
    let per_month = amount_arg(pos.get(3), "per month limit")?;
    let status = match flag_value(args, "--status") {
        Some(s) => {
            LimitStatus::parse_strict(s).ok_or_else(|| anyhow::anyhow!("Unknown status: {s}"))?
        }
        None => LimitStatus::Active,
    };

    let actor = acting_actor(args, config, db)?;
    let limit = admin::upsert_user_limit(db, &actor, user, company, per_po, per_month, status)?;
    println!(
        "PO limit updated for {user} in {company}: per PO {}, per month {} ({})",
        format_amount(limit.per_po_limit),
        format_amount(limit.per_month_limit),
        limit.status,
    );
    Ok(())
}

fn cli_set_status(
    args: &[String],
    config: &Config,
    db: &Database,
    status: LimitStatus,
) -> Result<()> {
    let pos = positionals(args);
    let (user, company) = user_company(&pos, "polimit revoke|reinstate <user> <company>")?;
    let actor = acting_actor(args, config, db)?;
    let limit = admin::set_limit_status(db, &actor, user, company, status)?;
    println!("PO limit for {user} in {company} is now {}", limit.status);
    Ok(())
}

fn cli_request(args: &[String], config: &Config, db: &Database) -> Result<()> {
    let pos = positionals(args);
    let company = pos
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: polimit request <company> <per_po> <per_month>"))?;
    let per_po = amount_arg(pos.get(1), "requested per PO limit")?;
    let per_month = amount_arg(pos.get(2), "requested per month limit")?;
    let reason = flag_value(args, "--reason").unwrap_or("");

    let actor = acting_actor(args, config, db)?;
    let req = workflow::submit(db, &actor.user, company, per_po, per_month, reason)?;
    println!(
        "Request {} submitted for approval (current: {} / {})",
        req.id.unwrap_or(0),
        format_amount(req.current_per_po_limit),
        format_amount(req.current_per_month_limit),
    );
    Ok(())
}

fn cli_requests(db: &Database, status: Option<RequestStatus>) -> Result<()> {
    let requests = db.list_increase_requests(status)?;
    if requests.is_empty() {
        println!("No requests");
        return Ok(());
    }
    print_request_table(&requests);
    Ok(())
}

fn request_id_arg(pos: &[&str], usage: &str) -> Result<i64> {
    let raw = pos
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: {usage}"))?;
    raw.trim_start_matches('#')
        .parse::<i64>()
        .with_context(|| format!("Invalid request id: {raw}"))
}

fn cli_show_request(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args);
    let id = request_id_arg(&pos, "polimit show-request <id>")?;
    let Some(r) = db.get_increase_request(id)? else {
        anyhow::bail!("Increase request {id} not found");
    };

    println!("Request {id}: {} @ {}", r.user, r.company);
    println!("{}", "─".repeat(40));
    println!("  Status:        {}", r.status);
    println!(
        "  Requested:     per PO {}, per month {}",
        format_amount(r.requested_per_po_limit),
        format_amount(r.requested_per_month_limit)
    );
    println!(
        "  At request:    per PO {}, per month {}",
        format_amount(r.current_per_po_limit),
        format_amount(r.current_per_month_limit)
    );
    if !r.reason.is_empty() {
        println!("  Reason:        {}", r.reason);
    }
    println!("  Created:       {}", r.created_at);
    if r.is_pending() {
        println!("  Awaiting MD approval");
    } else if r.status.is_terminal() {
        println!(
            "  Resolved:      {} by {}",
            r.resolved_at.as_deref().unwrap_or(""),
            r.resolved_by.as_deref().unwrap_or("")
        );
    }
    if let Some(why) = &r.rejection_reason {
        println!("  Rejected:      {why}");
    }
    Ok(())
}

fn cli_approve(args: &[String], config: &Config, db: &mut Database) -> Result<()> {
    let pos = positionals(args);
    let id = request_id_arg(&pos, "polimit approve <id>")?;
    let actor = acting_actor(args, config, db)?;
    let limit = workflow::approve(db, id, &actor)?;
    println!(
        "Request {id} approved. PO limits updated for {}: per PO {}, per month {}",
        limit.user,
        format_amount(limit.per_po_limit),
        format_amount(limit.per_month_limit),
    );
    Ok(())
}

fn cli_reject(args: &[String], config: &Config, db: &mut Database) -> Result<()> {
    let pos = positionals(args);
    let id = request_id_arg(&pos, "polimit reject <id> <reason...>")?;
    let reason = pos[1..].join(" ");
    let actor = acting_actor(args, config, db)?;
    workflow::reject(db, id, &actor, &reason)?;
    println!("Request {id} rejected");
    Ok(())
}

fn cli_submit_po(args: &[String], config: &Config, db: &mut Database) -> Result<()> {
    let pos = positionals(args);
    let (name, company) = match pos.as_slice() {
        [name, company, ..] => (*name, *company),
        _ => anyhow::bail!("Usage: polimit submit-po <name> <company> <amount> [--date YYYY-MM-DD]"),
    };
    let amount = amount_arg(pos.get(2), "amount")?;
    let date = match flag_value(args, "--date") {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {d}"))?,
        None => today(),
    };

    let actor = acting_actor(args, config, db)?;
    let po = PurchaseOrder::new(
        name.to_string(),
        company.to_string(),
        amount,
        date.format("%Y-%m-%d").to_string(),
    );
    let result = gate::submit_purchase_order(db, &actor.user, &po, today())?;
    if result.enabled && amount <= Decimal::ZERO {
        println!("{name}: nothing to book for a non-positive amount");
        Ok(())
    } else if result.enabled {
        println!("{name} submitted");
        println!("{}", result.explanation);
        Ok(())
    } else {
        anyhow::bail!("{}: {}", result.title, result.explanation)
    }
}

fn cli_cancel_po(args: &[String], db: &mut Database) -> Result<()> {
    let pos = positionals(args);
    let name = pos
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: polimit cancel-po <name>"))?;
    let sub = gate::cancel_purchase_order(db, name, today())?;
    println!(
        "{} cancelled; {} released from {}'s monthly usage",
        sub.po_name,
        format_amount(sub.amount),
        sub.user
    );
    Ok(())
}

fn cli_provision(args: &[String], db: &Database) -> Result<()> {
    let pos = positionals(args);
    let Some((user, companies)) = pos.split_first() else {
        anyhow::bail!("Usage: polimit provision <user> <company...>");
    };
    let companies: Vec<String> = companies.iter().map(|c| c.to_string()).collect();
    let created = admin::provision_user(db, user, &companies)?;
    println!("Created {created} PO limit record(s) for {user}");
    Ok(())
}

fn role_args(args: &[String], usage: &str) -> Result<(String, Role)> {
    let pos = positionals(args);
    let Some((user, role_words)) = pos.split_first() else {
        anyhow::bail!("Usage: {usage}");
    };
    let role_name = role_words.join(" ");
    let role = Role::parse(&role_name).ok_or_else(|| {
        let known: Vec<&str> = Role::all().iter().map(Role::as_str).collect();
        anyhow::anyhow!("Unknown role '{role_name}'. Known roles: {}", known.join(", "))
    })?;
    Ok((user.to_string(), role))
}

/// Role changes need an approver, except while nobody holds an approver role
/// yet, so a fresh database can be bootstrapped.
fn require_role_admin(args: &[String], config: &Config, db: &Database) -> Result<()> {
    let mut has_approver = false;
    for role in Role::all().iter().filter(|r| r.grants_approval()) {
        if !db.get_users_with_role(*role)?.is_empty() {
            has_approver = true;
            break;
        }
    }
    if !has_approver {
        return Ok(());
    }
    let actor = acting_actor(args, config, db)?;
    workflow::require_approver(&actor, "change roles")?;
    Ok(())
}

fn cli_grant(args: &[String], config: &Config, db: &Database) -> Result<()> {
    let (user, role) = role_args(args, "polimit grant <user> <role>")?;
    require_role_admin(args, config, db)?;
    if db.grant_role(&user, role)? {
        println!("Granted {role} to {user}");
    } else {
        println!("{user} already has {role}");
    }
    Ok(())
}

fn cli_revoke_role(args: &[String], config: &Config, db: &Database) -> Result<()> {
    let (user, role) = role_args(args, "polimit revoke-role <user> <role>")?;
    require_role_admin(args, config, db)?;
    if db.revoke_role(&user, role)? {
        println!("Removed {role} from {user}");
    } else {
        println!("{user} does not have {role}");
    }
    Ok(())
}

fn cli_users(db: &Database) -> Result<()> {
    let users = db.get_purchase_users()?;
    if users.is_empty() {
        println!("No users with purchase order roles");
        return Ok(());
    }
    println!("{:<24} Roles", "User");
    println!("{}", "─".repeat(60));
    for user in &users {
        let roles: Vec<&str> = db.get_roles(user)?.iter().map(Role::as_str).collect();
        println!("{user:<24} {}", roles.join(", "));
    }
    Ok(())
}

fn cli_export(args: &[String], db: &Database) -> Result<()> {
    let output_path = positionals(args)
        .first()
        .map(|a| PathBuf::from(expand_home(a)))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(format!("{home}/polimit-limits.csv"))
        });

    let limits = db.list_user_limits(&LimitFilter::default())?;
    let count = export::export_limits_csv(&limits, &output_path)?;
    println!("Exported {count} user limit(s) to {}", output_path.display());
    Ok(())
}
