//! Table formatting for console output

use chrono::{DateTime, Local, Utc};
use cirrus_core::{Bill, BillingRule, Notification, RentalRecord, RentalRequest, Resource, User};
use tabled::{settings::Style, Table, Tabled};

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%y-%m-%d %H:%M:%S").to_string()
}

pub fn display_resources(resources: &[&Resource]) {
    #[derive(Tabled)]
    struct ResourceRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Hardware")]
        hardware: String,
        #[tabled(rename = "Storage")]
        storage: String,
        #[tabled(rename = "Rate/h")]
        rate: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ResourceRow> = resources
        .iter()
        .map(|r| ResourceRow {
            id: r.id.to_string(),
            name: r.name.clone(),
            kind: r.kind().to_string(),
            hardware: r.hardware.summary(),
            storage: format!("{} GB", r.storage_gb),
            rate: r.hourly_rate.to_string(),
            status: r.status.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_requests(requests: &[&RentalRequest]) {
    #[derive(Tabled)]
    struct RequestRow {
        #[tabled(rename = "Request ID")]
        id: String,
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Resource")]
        resource: String,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "Hours")]
        hours: u32,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<RequestRow> = requests
        .iter()
        .map(|r| RequestRow {
            id: r.id.to_string(),
            user: r.user_id.to_string(),
            resource: r.resource_id.to_string(),
            start: format_timestamp(r.desired_start),
            hours: r.duration_hours,
            status: r.status.to_string(),
            notes: r.admin_notes.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_rentals(rentals: &[&RentalRecord]) {
    #[derive(Tabled)]
    struct RentalRow {
        #[tabled(rename = "Rental ID")]
        id: String,
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Resource")]
        resource: String,
        #[tabled(rename = "Started")]
        started: String,
        #[tabled(rename = "Ended")]
        ended: String,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<RentalRow> = rentals
        .iter()
        .map(|r| RentalRow {
            id: r.id.to_string(),
            user: r.user_id.to_string(),
            resource: r.resource_id.to_string(),
            started: format_timestamp(r.started_at),
            ended: r.ended_at.map(format_timestamp).unwrap_or_else(|| "-".to_string()),
            cost: r.total_cost.to_string(),
            status: r.status.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_bills(bills: &[&Bill]) {
    #[derive(Tabled)]
    struct BillRow {
        #[tabled(rename = "Bill ID")]
        id: String,
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Generated")]
        generated: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Paid")]
        paid: String,
    }

    let rows: Vec<BillRow> = bills
        .iter()
        .map(|b| BillRow {
            id: b.id.to_string(),
            user: b.user_id.to_string(),
            generated: format_timestamp(b.generated_at),
            amount: b.amount.to_string(),
            paid: if b.paid { "yes" } else { "no" }.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_users(users: &[&User]) {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Username")]
        username: String,
        #[tabled(rename = "Role")]
        role: String,
        #[tabled(rename = "Balance")]
        balance: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            id: u.id.to_string(),
            username: u.username.clone(),
            role: u.role.to_string(),
            balance: u.balance.to_string(),
            status: u.status.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_rules(rules: &[&BillingRule]) {
    #[derive(Tabled)]
    struct RuleRow {
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Rate/h")]
        rate: String,
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .map(|r| RuleRow {
            kind: r.kind.to_string(),
            rate: r.rate_per_hour.to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn display_notifications(notifications: &[&Notification]) {
    #[derive(Tabled)]
    struct NotificationRow {
        #[tabled(rename = "Sent")]
        sent: String,
        #[tabled(rename = "Priority")]
        priority: String,
        #[tabled(rename = "Message")]
        message: String,
    }

    let rows: Vec<NotificationRow> = notifications
        .iter()
        .map(|n| NotificationRow {
            sent: format_timestamp(n.sent_at),
            priority: n.priority.to_string(),
            message: n.message.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}
