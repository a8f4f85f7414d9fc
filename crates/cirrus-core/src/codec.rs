//! Type-tagged binary codec for every persisted record family.
//!
//! Each record encodes as a one-byte discriminator identifying the concrete
//! variant, the shared base fields in a fixed order, then variant-specific
//! fields in a fixed order. Decode reads the discriminator first and
//! dispatches to the matching constructor; an unrecognized tag is
//! `UnknownVariant`, a short or malformed stream is `CorruptData`.
//!
//! Strings are u32-length-prefixed UTF-8, so embedded NUL bytes round-trip.
//! Decimals use their exact 16-byte representation, timestamps are i64
//! microseconds since the epoch. All integers are little-endian.

use crate::billing::{Bill, BillingRule};
use crate::credits::Credits;
use crate::domain::{Hardware, Resource, ResourceKind, ResourceStatus, Role, User, UserStatus};
use crate::domain::user::Credential;
use crate::notify::{Notification, Priority};
use crate::rental::{RentalRecord, RentalRequest, RentalStatus, RequestStatus};
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use cirrus_common::{BillId, RentalId, RequestId, ResourceId, UserId};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown variant tag {tag:#04x}")]
    UnknownVariant { tag: u8 },

    #[error("corrupt data: {0}")]
    CorruptData(String),
}

type CodecResult<T> = Result<T, CodecError>;

// Variant discriminators. The tag space is partitioned per family so a file
// of one family can never silently decode as another.
pub(crate) mod tag {
    pub const RESOURCE_CPU: u8 = 0x01;
    pub const RESOURCE_GPU: u8 = 0x02;
    pub const USER_STUDENT: u8 = 0x11;
    pub const USER_TEACHER: u8 = 0x12;
    pub const USER_ADMIN: u8 = 0x13;
    pub const RENTAL_REQUEST: u8 = 0x21;
    pub const RENTAL_RECORD: u8 = 0x22;
    pub const BILL: u8 = 0x31;
    pub const BILLING_RULE: u8 = 0x32;
    pub const NOTIFICATION: u8 = 0x41;
}

/// Lossless binary round-trip of one record, self-describing enough to
/// reconstruct the concrete variant on decode.
pub trait BinaryCodec: Sized {
    fn encode(&self, buf: &mut Vec<u8>);
    fn decode(buf: &mut &[u8]) -> CodecResult<Self>;
}

fn need(buf: &&[u8], n: usize, what: &str) -> CodecResult<()> {
    if buf.remaining() < n {
        return Err(CodecError::CorruptData(format!(
            "stream ended while reading {what}"
        )));
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut &[u8], what: &str) -> CodecResult<u8> {
    need(buf, 1, what)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u32(buf: &mut &[u8], what: &str) -> CodecResult<u32> {
    need(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

fn get_i64(buf: &mut &[u8], what: &str) -> CodecResult<i64> {
    need(buf, 8, what)?;
    Ok(buf.get_i64_le())
}

fn get_f64(buf: &mut &[u8], what: &str) -> CodecResult<f64> {
    need(buf, 8, what)?;
    Ok(buf.get_f64_le())
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_string(buf: &mut &[u8], what: &str) -> CodecResult<String> {
    let len = get_u32(buf, what)? as usize;
    need(buf, len, what)?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes)
        .map_err(|_| CodecError::CorruptData(format!("{what} is not valid UTF-8")))
}

fn put_uuid(buf: &mut Vec<u8>, id: Uuid) {
    buf.put_slice(id.as_bytes());
}

fn get_uuid(buf: &mut &[u8], what: &str) -> CodecResult<Uuid> {
    need(buf, 16, what)?;
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    Ok(Uuid::from_bytes(bytes))
}

fn put_credits(buf: &mut Vec<u8>, amount: Credits) {
    buf.put_slice(&amount.as_decimal().serialize());
}

fn get_credits(buf: &mut &[u8], what: &str) -> CodecResult<Credits> {
    need(buf, 16, what)?;
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    Ok(Credits::from_decimal(Decimal::deserialize(bytes)))
}

fn put_time(buf: &mut Vec<u8>, at: DateTime<Utc>) {
    buf.put_i64_le(at.timestamp_micros());
}

fn get_time(buf: &mut &[u8], what: &str) -> CodecResult<DateTime<Utc>> {
    let micros = get_i64(buf, what)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| CodecError::CorruptData(format!("{what} is out of range")))
}

fn put_opt_time(buf: &mut Vec<u8>, at: Option<DateTime<Utc>>) {
    match at {
        Some(at) => {
            buf.put_u8(1);
            put_time(buf, at);
        }
        None => buf.put_u8(0),
    }
}

fn get_opt_time(buf: &mut &[u8], what: &str) -> CodecResult<Option<DateTime<Utc>>> {
    match get_u8(buf, what)? {
        0 => Ok(None),
        1 => Ok(Some(get_time(buf, what)?)),
        flag => Err(CodecError::CorruptData(format!(
            "invalid optional flag {flag} for {what}"
        ))),
    }
}

fn get_bool(buf: &mut &[u8], what: &str) -> CodecResult<bool> {
    match get_u8(buf, what)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::CorruptData(format!(
            "invalid boolean {other} for {what}"
        ))),
    }
}

fn resource_status_to_u8(status: ResourceStatus) -> u8 {
    match status {
        ResourceStatus::Idle => 0,
        ResourceStatus::InUse => 1,
    }
}

fn resource_status_from_u8(v: u8) -> CodecResult<ResourceStatus> {
    match v {
        0 => Ok(ResourceStatus::Idle),
        1 => Ok(ResourceStatus::InUse),
        other => Err(CodecError::CorruptData(format!(
            "invalid resource status {other}"
        ))),
    }
}

fn user_status_to_u8(status: UserStatus) -> u8 {
    match status {
        UserStatus::Active => 0,
        UserStatus::Suspended => 1,
    }
}

fn user_status_from_u8(v: u8) -> CodecResult<UserStatus> {
    match v {
        0 => Ok(UserStatus::Active),
        1 => Ok(UserStatus::Suspended),
        other => Err(CodecError::CorruptData(format!(
            "invalid user status {other}"
        ))),
    }
}

fn request_status_to_u8(status: RequestStatus) -> u8 {
    match status {
        RequestStatus::PendingApproval => 0,
        RequestStatus::Approved => 1,
        RequestStatus::Rejected => 2,
        RequestStatus::Cancelled => 3,
        RequestStatus::Expired => 4,
    }
}

fn request_status_from_u8(v: u8) -> CodecResult<RequestStatus> {
    match v {
        0 => Ok(RequestStatus::PendingApproval),
        1 => Ok(RequestStatus::Approved),
        2 => Ok(RequestStatus::Rejected),
        3 => Ok(RequestStatus::Cancelled),
        4 => Ok(RequestStatus::Expired),
        other => Err(CodecError::CorruptData(format!(
            "invalid request status {other}"
        ))),
    }
}

fn rental_status_to_u8(status: RentalStatus) -> u8 {
    match status {
        RentalStatus::Active => 0,
        RentalStatus::Completed => 1,
        RentalStatus::Cancelled => 2,
    }
}

fn rental_status_from_u8(v: u8) -> CodecResult<RentalStatus> {
    match v {
        0 => Ok(RentalStatus::Active),
        1 => Ok(RentalStatus::Completed),
        2 => Ok(RentalStatus::Cancelled),
        other => Err(CodecError::CorruptData(format!(
            "invalid rental status {other}"
        ))),
    }
}

fn kind_to_u8(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::Cpu => 0,
        ResourceKind::Gpu => 1,
    }
}

fn kind_from_u8(v: u8) -> CodecResult<ResourceKind> {
    match v {
        0 => Ok(ResourceKind::Cpu),
        1 => Ok(ResourceKind::Gpu),
        other => Err(CodecError::CorruptData(format!(
            "invalid resource kind {other}"
        ))),
    }
}

fn priority_to_u8(priority: Priority) -> u8 {
    match priority {
        Priority::Low => 0,
        Priority::Medium => 1,
        Priority::High => 2,
    }
}

fn priority_from_u8(v: u8) -> CodecResult<Priority> {
    match v {
        0 => Ok(Priority::Low),
        1 => Ok(Priority::Medium),
        2 => Ok(Priority::High),
        other => Err(CodecError::CorruptData(format!("invalid priority {other}"))),
    }
}

impl BinaryCodec for Resource {
    fn encode(&self, buf: &mut Vec<u8>) {
        match &self.hardware {
            Hardware::Cpu { .. } => buf.put_u8(tag::RESOURCE_CPU),
            Hardware::Gpu { .. } => buf.put_u8(tag::RESOURCE_GPU),
        }
        put_string(buf, self.id.as_str());
        put_string(buf, &self.name);
        buf.put_u8(resource_status_to_u8(self.status));
        buf.put_u32_le(self.storage_gb);
        put_credits(buf, self.hourly_rate);
        match &self.hardware {
            Hardware::Cpu { cores, clock_ghz } => {
                buf.put_u32_le(*cores);
                buf.put_f64_le(*clock_ghz);
            }
            Hardware::Gpu {
                parallel_cores,
                vram_gb,
            } => {
                buf.put_u32_le(*parallel_cores);
                buf.put_u32_le(*vram_gb);
            }
        }
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        let tag = get_u8(buf, "resource tag")?;
        let id = ResourceId::new(get_string(buf, "resource id")?);
        let name = get_string(buf, "resource name")?;
        let status = resource_status_from_u8(get_u8(buf, "resource status")?)?;
        let storage_gb = get_u32(buf, "resource storage")?;
        let hourly_rate = get_credits(buf, "resource rate")?;
        let hardware = match tag {
            tag::RESOURCE_CPU => Hardware::Cpu {
                cores: get_u32(buf, "cpu cores")?,
                clock_ghz: get_f64(buf, "cpu clock")?,
            },
            tag::RESOURCE_GPU => Hardware::Gpu {
                parallel_cores: get_u32(buf, "gpu cores")?,
                vram_gb: get_u32(buf, "gpu vram")?,
            },
            tag => return Err(CodecError::UnknownVariant { tag }),
        };
        Ok(Resource {
            id,
            name,
            status,
            hourly_rate,
            storage_gb,
            hardware,
        })
    }
}

impl BinaryCodec for User {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(match self.role {
            Role::Student => tag::USER_STUDENT,
            Role::Teacher => tag::USER_TEACHER,
            Role::Admin => tag::USER_ADMIN,
        });
        put_string(buf, self.id.as_str());
        put_string(buf, &self.username);
        put_string(buf, self.password_hash.as_str());
        put_credits(buf, self.balance);
        buf.put_u8(user_status_to_u8(self.status));
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        let role = match get_u8(buf, "user tag")? {
            tag::USER_STUDENT => Role::Student,
            tag::USER_TEACHER => Role::Teacher,
            tag::USER_ADMIN => Role::Admin,
            tag => return Err(CodecError::UnknownVariant { tag }),
        };
        Ok(User {
            id: UserId::new(get_string(buf, "user id")?),
            username: get_string(buf, "username")?,
            password_hash: Credential(get_string(buf, "credential")?),
            balance: get_credits(buf, "balance")?,
            status: user_status_from_u8(get_u8(buf, "user status")?)?,
            role,
        })
    }
}

impl BinaryCodec for RentalRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(tag::RENTAL_REQUEST);
        put_uuid(buf, self.id.as_uuid());
        put_string(buf, self.user_id.as_str());
        put_string(buf, self.resource_id.as_str());
        put_time(buf, self.requested_at);
        put_time(buf, self.desired_start);
        buf.put_u32_le(self.duration_hours);
        buf.put_u8(request_status_to_u8(self.status));
        put_string(buf, &self.admin_notes);
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        match get_u8(buf, "request tag")? {
            tag::RENTAL_REQUEST => {}
            tag => return Err(CodecError::UnknownVariant { tag }),
        }
        Ok(RentalRequest {
            id: RequestId::from_uuid(get_uuid(buf, "request id")?),
            user_id: UserId::new(get_string(buf, "request user")?),
            resource_id: ResourceId::new(get_string(buf, "request resource")?),
            requested_at: get_time(buf, "request time")?,
            desired_start: get_time(buf, "desired start")?,
            duration_hours: get_u32(buf, "duration")?,
            status: request_status_from_u8(get_u8(buf, "request status")?)?,
            admin_notes: get_string(buf, "admin notes")?,
        })
    }
}

impl BinaryCodec for RentalRecord {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(tag::RENTAL_RECORD);
        put_uuid(buf, self.id.as_uuid());
        put_uuid(buf, self.request_id.as_uuid());
        put_string(buf, self.user_id.as_str());
        put_string(buf, self.resource_id.as_str());
        put_time(buf, self.started_at);
        put_opt_time(buf, self.ended_at);
        put_credits(buf, self.total_cost);
        buf.put_u8(rental_status_to_u8(self.status));
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        match get_u8(buf, "rental tag")? {
            tag::RENTAL_RECORD => {}
            tag => return Err(CodecError::UnknownVariant { tag }),
        }
        Ok(RentalRecord {
            id: RentalId::from_uuid(get_uuid(buf, "rental id")?),
            request_id: RequestId::from_uuid(get_uuid(buf, "rental request id")?),
            user_id: UserId::new(get_string(buf, "rental user")?),
            resource_id: ResourceId::new(get_string(buf, "rental resource")?),
            started_at: get_time(buf, "rental start")?,
            ended_at: get_opt_time(buf, "rental end")?,
            total_cost: get_credits(buf, "rental cost")?,
            status: rental_status_from_u8(get_u8(buf, "rental status")?)?,
        })
    }
}

impl BinaryCodec for Bill {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(tag::BILL);
        put_uuid(buf, self.id.as_uuid());
        put_uuid(buf, self.rental_id.as_uuid());
        put_string(buf, self.user_id.as_str());
        put_time(buf, self.generated_at);
        put_credits(buf, self.amount);
        buf.put_u8(self.paid as u8);
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        match get_u8(buf, "bill tag")? {
            tag::BILL => {}
            tag => return Err(CodecError::UnknownVariant { tag }),
        }
        Ok(Bill {
            id: BillId::from_uuid(get_uuid(buf, "bill id")?),
            rental_id: RentalId::from_uuid(get_uuid(buf, "bill rental id")?),
            user_id: UserId::new(get_string(buf, "bill user")?),
            generated_at: get_time(buf, "bill date")?,
            amount: get_credits(buf, "bill amount")?,
            paid: get_bool(buf, "bill paid flag")?,
        })
    }
}

impl BinaryCodec for BillingRule {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(tag::BILLING_RULE);
        buf.put_u8(kind_to_u8(self.kind));
        put_credits(buf, self.rate_per_hour);
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        match get_u8(buf, "rule tag")? {
            tag::BILLING_RULE => {}
            tag => return Err(CodecError::UnknownVariant { tag }),
        }
        Ok(BillingRule {
            kind: kind_from_u8(get_u8(buf, "rule kind")?)?,
            rate_per_hour: get_credits(buf, "rule rate")?,
        })
    }
}

impl BinaryCodec for Notification {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(tag::NOTIFICATION);
        put_uuid(buf, self.id);
        put_string(buf, self.user_id.as_str());
        put_string(buf, &self.message);
        put_time(buf, self.sent_at);
        buf.put_u8(priority_to_u8(self.priority));
        buf.put_u8(self.read as u8);
    }

    fn decode(buf: &mut &[u8]) -> CodecResult<Self> {
        match get_u8(buf, "notification tag")? {
            tag::NOTIFICATION => {}
            tag => return Err(CodecError::UnknownVariant { tag }),
        }
        Ok(Notification {
            id: get_uuid(buf, "notification id")?,
            user_id: UserId::new(get_string(buf, "notification user")?),
            message: get_string(buf, "message")?,
            sent_at: get_time(buf, "sent time")?,
            priority: priority_from_u8(get_u8(buf, "priority")?)?,
            read: get_bool(buf, "read flag")?,
        })
    }
}
