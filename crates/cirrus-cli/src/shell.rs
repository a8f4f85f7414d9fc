//! Interactive menu shell.
//!
//! One session at a time: an anonymous visitor logs in or registers, then
//! gets the menu for their role. Admin review, rental return and bill
//! payment all funnel through the service; the shell only collects input
//! and renders results.

use crate::tables;
use anyhow::Result;
use chrono::{Duration, Utc};
use cirrus_common::UserId;
use cirrus_core::{
    CirrusService, Credits, Hardware, Resource, ResourceKind, Role, UserStatus,
};
use cirrus_common::ResourceId;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};

struct Session {
    user_id: UserId,
    username: String,
    role: Role,
}

pub fn run(service: &mut CirrusService) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("{}", style("Cirrus campus cloud console").bold().cyan());

    let mut session: Option<Session> = None;
    loop {
        // Requests whose window passed while the console sat idle.
        service.expire_pending_at(Utc::now());

        let next = match &session {
            None => anonymous_menu(service, &theme)?,
            Some(s) if s.role.is_admin() => admin_menu(service, &theme, s)?,
            Some(s) => user_menu(service, &theme, s)?,
        };
        match next {
            Flow::Stay => {}
            Flow::Login(new_session) => session = Some(new_session),
            Flow::Logout => session = None,
            Flow::Exit => return Ok(()),
        }
    }
}

enum Flow {
    Stay,
    Login(Session),
    Logout,
    Exit,
}

fn report(result: cirrus_core::Result<()>) {
    match result {
        Ok(()) => println!("{}", style("done").green()),
        Err(err) => println!("{}", style(err).red()),
    }
}

fn anonymous_menu(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<Flow> {
    let choice = Select::with_theme(theme)
        .with_prompt("Welcome")
        .items(&["Log in", "Register", "Browse resources", "Exit"])
        .default(0)
        .interact()?;
    match choice {
        0 => login(service, theme),
        1 => register(service, theme),
        2 => {
            tables::display_resources(&service.resources().collect::<Vec<_>>());
            Ok(Flow::Stay)
        }
        _ => Ok(Flow::Exit),
    }
}

fn login(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<Flow> {
    let username: String = Input::with_theme(theme)
        .with_prompt("Username")
        .interact_text()?;
    let password = Password::with_theme(theme)
        .with_prompt("Password")
        .interact()?;

    match service.authenticate(&username, &password) {
        Some(user) => {
            let session = Session {
                user_id: user.id.clone(),
                username: user.username.clone(),
                role: user.role,
            };
            println!(
                "{}",
                style(format!("Welcome back, {} ({})", session.username, session.role)).green()
            );
            Ok(Flow::Login(session))
        }
        None => {
            println!("{}", style("Invalid username or password").red());
            Ok(Flow::Stay)
        }
    }
}

fn register(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<Flow> {
    let username: String = Input::with_theme(theme)
        .with_prompt("Username")
        .interact_text()?;
    let password = Password::with_theme(theme)
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    let role = match Select::with_theme(theme)
        .with_prompt("Account type")
        .items(&["Student", "Teacher"])
        .default(0)
        .interact()?
    {
        0 => Role::Student,
        _ => Role::Teacher,
    };

    match service.register_user(&username, &password, role) {
        Ok(user_id) => {
            println!(
                "{}",
                style(format!("Registered as {user_id}; you can now log in")).green()
            );
        }
        Err(err) => println!("{}", style(err).red()),
    }
    Ok(Flow::Stay)
}

fn user_menu(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<Flow> {
    let unread = service.unread_notifications(&session.user_id).len();
    let notifications_item = if unread > 0 {
        format!("Notifications ({unread} unread)")
    } else {
        "Notifications".to_string()
    };
    let items = [
        "Browse resources".to_string(),
        "Request a rental".to_string(),
        "My requests".to_string(),
        "My rentals".to_string(),
        "My bills".to_string(),
        "Deposit credits".to_string(),
        notifications_item,
        "Log out".to_string(),
        "Exit".to_string(),
    ];
    let choice = Select::with_theme(theme)
        .with_prompt(format!("{} ({})", session.username, session.role))
        .items(&items)
        .default(0)
        .interact()?;

    match choice {
        0 => tables::display_resources(&service.resources().collect::<Vec<_>>()),
        1 => request_rental(service, theme, session)?,
        2 => my_requests(service, theme, session)?,
        3 => my_rentals(service, theme, session)?,
        4 => my_bills(service, theme, session)?,
        5 => {
            let amount: f64 = Input::with_theme(theme)
                .with_prompt("Amount to deposit")
                .interact_text()?;
            match Credits::from_f64(amount) {
                Some(amount) => report(service.deposit(&session.user_id, amount)),
                None => println!("{}", style("Not a valid amount").red()),
            }
        }
        6 => show_notifications(service, theme, session)?,
        7 => return Ok(Flow::Logout),
        _ => return Ok(Flow::Exit),
    }
    Ok(Flow::Stay)
}

fn request_rental(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<()> {
    let available = service.available_resources();
    if available.is_empty() {
        println!("{}", style("No resources are available right now").yellow());
        return Ok(());
    }
    let labels: Vec<String> = available
        .iter()
        .map(|r| format!("{} - {} ({}/h)", r.id, r.name, r.hourly_rate))
        .collect();
    let ids: Vec<ResourceId> = available.iter().map(|r| r.id.clone()).collect();
    let pick = Select::with_theme(theme)
        .with_prompt("Resource")
        .items(&labels)
        .default(0)
        .interact()?;

    let start_in_hours: u32 = Input::with_theme(theme)
        .with_prompt("Start in how many hours")
        .default(0)
        .interact_text()?;
    let duration_hours: u32 = Input::with_theme(theme)
        .with_prompt("Duration in hours")
        .default(1)
        .interact_text()?;

    let now = Utc::now();
    let desired_start = now + Duration::hours(start_in_hours as i64);
    match service.create_request_at(&session.user_id, &ids[pick], desired_start, duration_hours, now)
    {
        Ok(request_id) => println!(
            "{}",
            style(format!("Request {request_id} filed, awaiting approval")).green()
        ),
        Err(err) => println!("{}", style(err).red()),
    }
    Ok(())
}

fn my_requests(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<()> {
    let requests = service.user_requests(&session.user_id);
    if requests.is_empty() {
        println!("{}", style("No requests yet").yellow());
        return Ok(());
    }
    tables::display_requests(&requests);

    let pending: Vec<_> = requests
        .iter()
        .filter(|r| r.status == cirrus_core::RequestStatus::PendingApproval)
        .map(|r| r.id)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    if Confirm::with_theme(theme)
        .with_prompt("Cancel a pending request?")
        .default(false)
        .interact()?
    {
        let labels: Vec<String> = pending.iter().map(|id| id.to_string()).collect();
        let pick = Select::with_theme(theme)
            .with_prompt("Which request")
            .items(&labels)
            .default(0)
            .interact()?;
        report(service.cancel_request(pending[pick]));
    }
    Ok(())
}

fn my_rentals(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<()> {
    let rentals = service.user_rentals(&session.user_id);
    if rentals.is_empty() {
        println!("{}", style("No rentals yet").yellow());
        return Ok(());
    }
    tables::display_rentals(&rentals);

    let active: Vec<_> = rentals.iter().filter(|r| r.is_active()).map(|r| r.id).collect();
    if active.is_empty() {
        return Ok(());
    }
    let choice = Select::with_theme(theme)
        .with_prompt("Active rental action")
        .items(&["Return (complete and bill)", "Cancel (no charge)", "Nothing"])
        .default(2)
        .interact()?;
    if choice == 2 {
        return Ok(());
    }
    let labels: Vec<String> = active.iter().map(|id| id.to_string()).collect();
    let pick = Select::with_theme(theme)
        .with_prompt("Which rental")
        .items(&labels)
        .default(0)
        .interact()?;
    if choice == 0 {
        match service.complete_rental(active[pick]) {
            Ok(bill_id) => {
                let amount = service
                    .bill(bill_id)
                    .map(|b| b.amount.to_string())
                    .unwrap_or_default();
                println!(
                    "{}",
                    style(format!("Returned; bill {bill_id} for {amount} credits")).green()
                );
            }
            Err(err) => println!("{}", style(err).red()),
        }
    } else {
        report(service.cancel_rental(active[pick]));
    }
    Ok(())
}

fn my_bills(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<()> {
    let bills = service.user_bills(&session.user_id);
    if bills.is_empty() {
        println!("{}", style("No bills").yellow());
        return Ok(());
    }
    tables::display_bills(&bills);

    let unpaid: Vec<_> = bills.iter().filter(|b| !b.paid).map(|b| b.id).collect();
    if unpaid.is_empty() {
        return Ok(());
    }
    if Confirm::with_theme(theme)
        .with_prompt("Pay an outstanding bill?")
        .default(true)
        .interact()?
    {
        let labels: Vec<String> = unpaid.iter().map(|id| id.to_string()).collect();
        let pick = Select::with_theme(theme)
            .with_prompt("Which bill")
            .items(&labels)
            .default(0)
            .interact()?;
        report(service.pay_bill(unpaid[pick]));
    }
    Ok(())
}

fn show_notifications(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<()> {
    let unread = service.unread_notifications(&session.user_id);
    if unread.is_empty() {
        println!("{}", style("No unread notifications").yellow());
    } else {
        tables::display_notifications(&unread);
    }
    match Select::with_theme(theme)
        .with_prompt("Notifications")
        .items(&["Mark all as read", "Clear read notifications", "Back"])
        .default(2)
        .interact()?
    {
        0 => {
            service.mark_all_notifications_read(&session.user_id);
        }
        1 => {
            let cleared = service.clear_read_notifications(&session.user_id);
            println!("{}", style(format!("Cleared {cleared}")).green());
        }
        _ => {}
    }
    Ok(())
}

fn admin_menu(
    service: &mut CirrusService,
    theme: &ColorfulTheme,
    session: &Session,
) -> Result<Flow> {
    let pending = service.pending_requests().len();
    let review_item = if pending > 0 {
        format!("Review requests ({pending} pending)")
    } else {
        "Review requests".to_string()
    };
    let items = [
        review_item,
        "All rentals".to_string(),
        "All bills".to_string(),
        "Manage resources".to_string(),
        "Manage users".to_string(),
        "Billing rules".to_string(),
        "Log out".to_string(),
        "Exit".to_string(),
    ];
    let choice = Select::with_theme(theme)
        .with_prompt(format!("{} (admin)", session.username))
        .items(&items)
        .default(0)
        .interact()?;

    match choice {
        0 => review_requests(service, theme)?,
        1 => {
            let rentals: Vec<_> = service
                .active_rentals()
                .into_iter()
                .collect();
            if rentals.is_empty() {
                println!("{}", style("No active rentals").yellow());
            } else {
                tables::display_rentals(&rentals);
            }
        }
        2 => {
            let bills: Vec<_> = service.all_bills().collect();
            if bills.is_empty() {
                println!("{}", style("No bills").yellow());
            } else {
                tables::display_bills(&bills);
            }
        }
        3 => manage_resources(service, theme)?,
        4 => manage_users(service, theme)?,
        5 => billing_rules(service, theme)?,
        6 => return Ok(Flow::Logout),
        _ => return Ok(Flow::Exit),
    }
    Ok(Flow::Stay)
}

fn review_requests(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<()> {
    let pending = service.pending_requests();
    if pending.is_empty() {
        println!("{}", style("Nothing awaiting review").yellow());
        return Ok(());
    }
    tables::display_requests(&pending);

    let labels: Vec<String> = pending
        .iter()
        .map(|r| format!("{} ({} for {})", r.id, r.user_id, r.resource_id))
        .collect();
    let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
    let pick = Select::with_theme(theme)
        .with_prompt("Request to review")
        .items(&labels)
        .default(0)
        .interact()?;
    let decision = Select::with_theme(theme)
        .with_prompt("Decision")
        .items(&["Approve", "Reject", "Skip"])
        .default(0)
        .interact()?;
    if decision == 2 {
        return Ok(());
    }
    let notes: String = Input::with_theme(theme)
        .with_prompt("Notes")
        .allow_empty(true)
        .interact_text()?;

    if decision == 0 {
        match service.approve_request(ids[pick], &notes) {
            Ok(rental_id) => println!(
                "{}",
                style(format!("Approved; rental {rental_id} is now active")).green()
            ),
            Err(err) => println!("{}", style(err).red()),
        }
    } else {
        report(service.reject_request(ids[pick], &notes, Utc::now()));
    }
    Ok(())
}

fn manage_resources(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<()> {
    let choice = Select::with_theme(theme)
        .with_prompt("Resources")
        .items(&["List", "Add", "Remove", "Set hourly rate"])
        .default(0)
        .interact()?;
    match choice {
        0 => tables::display_resources(&service.resources().collect::<Vec<_>>()),
        1 => {
            let id: String = Input::with_theme(theme).with_prompt("ID").interact_text()?;
            let name: String = Input::with_theme(theme)
                .with_prompt("Name")
                .interact_text()?;
            let rate: f64 = Input::with_theme(theme)
                .with_prompt("Hourly rate (0 to use the kind rule)")
                .interact_text()?;
            let storage_gb: u32 = Input::with_theme(theme)
                .with_prompt("Storage (GB)")
                .interact_text()?;
            let hardware = match Select::with_theme(theme)
                .with_prompt("Kind")
                .items(&["CPU", "GPU"])
                .default(0)
                .interact()?
            {
                0 => {
                    let cores: u32 = Input::with_theme(theme)
                        .with_prompt("Cores")
                        .interact_text()?;
                    let clock_ghz: f64 = Input::with_theme(theme)
                        .with_prompt("Clock (GHz)")
                        .interact_text()?;
                    Hardware::Cpu { cores, clock_ghz }
                }
                _ => {
                    let parallel_cores: u32 = Input::with_theme(theme)
                        .with_prompt("Parallel cores")
                        .interact_text()?;
                    let vram_gb: u32 = Input::with_theme(theme)
                        .with_prompt("VRAM (GB)")
                        .interact_text()?;
                    Hardware::Gpu {
                        parallel_cores,
                        vram_gb,
                    }
                }
            };
            match Credits::from_f64(rate) {
                Some(rate) => report(service.add_resource(Resource::new(
                    ResourceId::new(id),
                    name,
                    rate,
                    storage_gb,
                    hardware,
                ))),
                None => println!("{}", style("Not a valid rate").red()),
            }
        }
        2 => {
            let id: String = Input::with_theme(theme).with_prompt("ID").interact_text()?;
            report(service.remove_resource(&ResourceId::new(id)).map(|_| ()));
        }
        _ => {
            let id: String = Input::with_theme(theme).with_prompt("ID").interact_text()?;
            let rate: f64 = Input::with_theme(theme)
                .with_prompt("New hourly rate")
                .interact_text()?;
            match Credits::from_f64(rate) {
                Some(rate) => report(service.set_resource_rate(&ResourceId::new(id), rate)),
                None => println!("{}", style("Not a valid rate").red()),
            }
        }
    }
    Ok(())
}

fn manage_users(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<()> {
    let choice = Select::with_theme(theme)
        .with_prompt("Users")
        .items(&["List", "Suspend", "Reinstate", "Deposit credits"])
        .default(0)
        .interact()?;
    if choice == 0 {
        tables::display_users(&service.users().collect::<Vec<_>>());
        return Ok(());
    }
    let id: String = Input::with_theme(theme)
        .with_prompt("User ID")
        .interact_text()?;
    let user_id = UserId::new(id);
    match choice {
        1 => report(service.set_user_status(&user_id, UserStatus::Suspended)),
        2 => report(service.set_user_status(&user_id, UserStatus::Active)),
        _ => {
            let amount: f64 = Input::with_theme(theme)
                .with_prompt("Amount")
                .interact_text()?;
            match Credits::from_f64(amount) {
                Some(amount) => report(service.deposit(&user_id, amount)),
                None => println!("{}", style("Not a valid amount").red()),
            }
        }
    }
    Ok(())
}

fn billing_rules(service: &mut CirrusService, theme: &ColorfulTheme) -> Result<()> {
    let rules: Vec<_> = service.billing_rules().collect();
    if !rules.is_empty() {
        tables::display_rules(&rules);
    }
    let kind = match Select::with_theme(theme)
        .with_prompt("Set rule for kind")
        .items(&["CPU", "GPU", "Back"])
        .default(2)
        .interact()?
    {
        0 => ResourceKind::Cpu,
        1 => ResourceKind::Gpu,
        _ => return Ok(()),
    };
    let rate: f64 = Input::with_theme(theme)
        .with_prompt("Rate per hour")
        .interact_text()?;
    match Credits::from_f64(rate) {
        Some(rate) => report(service.set_billing_rule(kind, rate)),
        None => println!("{}", style("Not a valid rate").red()),
    }
    Ok(())
}
