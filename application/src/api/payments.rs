//! Payments endpoints: rent payments, settlement and reminders.

use axum::{
    routing::{get, post},
    Router,
};
use common::{Date, Money, Month, Percent};
use http::StatusCode;
use serde::{de, Deserialize, Deserializer, Serialize};
use service::{
    command::{self, Command as _},
    domain::{assignment, payment, property, reminder, user},
    query::{self, Query as _},
    read, Actor,
};

use crate::{
    api::{self, Json, Message, OptionalJson, Path, Query},
    define_error, AsError, Context, Error,
};

/// Creates a new [`Router`] of the payments endpoints.
pub(super) fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/create", post(create))
        .route("/generate-monthly", post(generate_monthly))
        .route("/stats", get(stats))
        .route("/my-payments", get(my_payments))
        .route("/my-current", get(my_current))
        .route("/:id", get(get_one).patch(update))
        .route("/:id/record", post(record))
        .route("/:id/pay", post(pay))
        .route("/:id/reminders", get(reminders).post(remind))
}

/// Monthly rent payment.
#[derive(Clone, Debug, Serialize)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: payment::Id,

    /// ID of the lease this [`Payment`] belongs to.
    pub assignment_id: assignment::Id,

    /// Amount due.
    pub amount: Money,

    /// Date this [`Payment`] is due at.
    pub due_date: payment::DueDate,

    /// Date this [`Payment`] was settled at.
    pub payment_date: Option<payment::SettlementDate>,

    /// Status of this [`Payment`].
    pub status: payment::Status,

    /// Method this [`Payment`] was settled with.
    pub payment_method: Option<payment::Method>,

    /// Unique opaque reference of this [`Payment`].
    pub reference: payment::Reference,

    /// Receipt number, issued once paid.
    pub receipt_number: Option<payment::ReceiptNumber>,

    /// Free-form notes.
    pub notes: payment::Notes,

    /// Indicator whether this [`Payment`] is unpaid past its due date.
    pub is_late: bool,

    /// [`DateTime`] when this [`Payment`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: payment::CreationDateTime,

    /// [`DateTime`] when this [`Payment`] was last updated.
    ///
    /// [`DateTime`]: common::DateTime
    pub updated_at: payment::ModificationDateTime,
}

impl From<service::domain::Payment> for Payment {
    fn from(p: service::domain::Payment) -> Self {
        Self {
            is_late: p.is_late(Date::today()),
            id: p.id,
            assignment_id: p.assignment_id,
            amount: p.amount,
            due_date: p.due_date,
            payment_date: p.payment_date,
            status: p.status,
            payment_method: p.method,
            reference: p.reference,
            receipt_number: p.receipt_number,
            notes: p.notes,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Query parameters of the payments lists.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentsFilter {
    /// Status of the payments.
    pub status: Option<payment::Status>,

    /// Month of the due date in a `YYYY-MM` format.
    ///
    /// Ignored if malformed.
    pub month: Option<String>,

    /// ID of the leased property.
    pub property_id: Option<property::Id>,

    /// ID of the tenant.
    pub tenant_id: Option<user::Id>,

    /// Number of the page to return.
    pub page: Option<u32>,

    /// Maximum number of payments per page.
    pub per_page: Option<u32>,
}

impl PaymentsFilter {
    /// Builds a [`read::payment::list::Selector`] out of this
    /// [`PaymentsFilter`].
    ///
    /// # Errors
    ///
    /// With `INVALID_PAGINATION` if pagination is out of range.
    fn selector(self) -> Result<read::payment::list::Selector, Error> {
        Ok(read::payment::list::Selector {
            arguments: api::arguments(self.page, self.per_page)?,
            filter: read::payment::list::Filter {
                status: self.status,
                month: self.month.as_deref().and_then(Month::parse_lenient),
                property_id: self.property_id,
                tenant_id: self.tenant_id,
            },
        })
    }
}

/// Lists the payments visible to the authenticated user.
#[tracing::instrument(
    skip_all,
    fields(api.name = "listPayments", otel.name = api::SPAN_NAME),
)]
async fn list(
    ctx: Context,
    Query(filter): Query<PaymentsFilter>,
) -> Result<Json<api::List<Payment>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::payment::List::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// Lists the payments of the authenticated tenant.
#[tracing::instrument(
    skip_all,
    fields(api.name = "myPayments", otel.name = api::SPAN_NAME),
)]
async fn my_payments(
    ctx: Context,
    Query(filter): Query<PaymentsFilter>,
) -> Result<Json<api::List<Payment>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::payment::Mine::by(actor, filter.selector()?))
        .await
        .map(|page| Json(page.into()))
        .map_err(AsError::into_error)
}

/// Response to the current payment lookup of a tenant.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum CurrentPayment {
    /// Earliest unpaid payment.
    Due(Payment),

    /// Nothing is due.
    Settled(Message),
}

/// Returns the earliest unpaid payment of the authenticated tenant.
#[tracing::instrument(
    skip_all,
    fields(api.name = "myCurrentPayment", otel.name = api::SPAN_NAME),
)]
async fn my_current(ctx: Context) -> Result<Json<CurrentPayment>, Error> {
    let actor = ctx.actor().await?;

    let current = ctx
        .service()
        .execute(query::payment::Current::by(actor, ()))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(current.map_or_else(
        || CurrentPayment::Settled(Message::new("No pending payment")),
        |read::payment::Current(p)| CurrentPayment::Due(p.into()),
    )))
}

/// New payment of a lease.
#[derive(Debug, Deserialize)]
pub struct NewPayment {
    /// ID of the active lease.
    pub assignment_id: assignment::Id,

    /// Amount due.
    pub amount: Money,

    /// Date the payment is due at.
    pub due_date: payment::DueDate,

    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

impl NewPayment {
    /// Builds a [`command::CreatePayment`] out of this [`NewPayment`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the notes are too long.
    fn into_command(
        self,
        actor: Actor,
    ) -> Result<command::CreatePayment, Error> {
        Ok(command::CreatePayment {
            actor,
            assignment_id: self.assignment_id,
            amount: self.amount,
            due_date: self.due_date,
            notes: api::field("notes", self.notes, payment::Notes::new)?,
        })
    }
}

/// Creates a new payment of an active lease.
///
/// # Errors
///
/// With `ASSIGNMENT_INACTIVE` if the lease has been ended.
#[tracing::instrument(
    skip_all,
    fields(api.name = "createPayment", otel.name = api::SPAN_NAME),
)]
async fn create(
    ctx: Context,
    Json(req): Json<NewPayment>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor)?)
        .await
        .map(|p| (StatusCode::CREATED, Json(p.into())))
        .map_err(AsError::into_error)
}

/// Returns a payment by its ID.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "getPayment",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn get_one(
    ctx: Context,
    Path(id): Path<payment::Id>,
) -> Result<Json<Payment>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::payment::ById::by(actor, id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|p| Json(p.into()))
}

/// Changes to a payment.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentUpdate {
    /// New amount due.
    pub amount: Option<Money>,

    /// New due date.
    pub due_date: Option<payment::DueDate>,

    /// New status.
    pub status: Option<payment::Status>,

    /// Settlement date, required when marking as paid.
    pub payment_date: Option<payment::SettlementDate>,

    /// Settlement method, required when marking as paid.
    pub payment_method: Option<payment::Method>,

    /// New notes.
    pub notes: Option<String>,
}

impl PaymentUpdate {
    /// Builds a [`command::UpdatePayment`] out of this [`PaymentUpdate`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the notes are too long.
    fn into_command(
        self,
        actor: Actor,
        payment_id: payment::Id,
    ) -> Result<command::UpdatePayment, Error> {
        Ok(command::UpdatePayment {
            actor,
            payment_id,
            amount: self.amount,
            due_date: self.due_date,
            status: self.status,
            payment_date: self.payment_date,
            method: self.payment_method,
            notes: api::optional("notes", self.notes, payment::Notes::new)?,
        })
    }
}

/// Updates a payment by its ID.
///
/// # Errors
///
/// Possible error codes:
/// - `PAYMENT_DETAILS_REQUIRED` - marked as paid without date or method;
/// - `PAYMENT_ALREADY_PAID` - a paid payment is moved out of being paid.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "updatePayment",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn update(
    ctx: Context,
    Path(id): Path<payment::Id>,
    Json(req): Json<PaymentUpdate>,
) -> Result<Json<Payment>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|p| Json(p.into()))
        .map_err(AsError::into_error)
}

/// Settlement of a payment recorded by staff.
#[derive(Debug, Default, Deserialize)]
pub struct Settlement {
    /// Settlement date, today by default.
    pub payment_date: Option<payment::SettlementDate>,

    /// Settlement method, `other` by default.
    pub payment_method: Option<String>,

    /// Notes replacing the existing ones.
    pub notes: Option<String>,
}

impl Settlement {
    /// Builds a [`command::RecordPayment`] out of this [`Settlement`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the method is unknown or the notes are too
    /// long.
    fn into_command(
        self,
        actor: Actor,
        payment_id: payment::Id,
    ) -> Result<command::RecordPayment, Error> {
        Ok(command::RecordPayment {
            actor,
            payment_id,
            payment_date: self.payment_date,
            method: method(self.payment_method)?,
            notes: api::optional("notes", self.notes, payment::Notes::new)?,
        })
    }
}

/// Parses the optional `payment_method` of a request.
///
/// # Errors
///
/// With `INVALID_FIELD` if the method is unknown.
fn method(value: Option<String>) -> Result<Option<payment::Method>, Error> {
    api::optional("payment_method", value, |m| m.trim().parse().ok())
}

/// Response carrying a settled payment.
#[derive(Clone, Debug, Serialize)]
pub struct Settled {
    /// Human-readable confirmation.
    pub message: String,

    /// Settled payment.
    pub payment: Payment,

    /// Receipt number of the settled payment, if paid by its tenant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<payment::ReceiptNumber>,
}

/// Records a payment as settled.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "recordPayment",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn record(
    ctx: Context,
    Path(id): Path<payment::Id>,
    OptionalJson(req): OptionalJson<Settlement>,
) -> Result<Json<Settled>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|p| {
            Json(Settled {
                message: "Payment recorded".into(),
                payment: p.into(),
                receipt_number: None,
            })
        })
        .map_err(AsError::into_error)
}

/// Payment of a tenant's own rent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pay {
    /// Settlement method, `card` by default.
    pub payment_method: Option<String>,
}

impl Pay {
    /// Builds a [`command::MakePayment`] out of this [`Pay`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the method is unknown.
    fn into_command(
        self,
        actor: Actor,
        payment_id: payment::Id,
    ) -> Result<command::MakePayment, Error> {
        Ok(command::MakePayment {
            actor,
            payment_id,
            method: method(self.payment_method)?,
        })
    }
}

/// Pays a payment on behalf of the authenticated tenant.
///
/// # Errors
///
/// With `PAYMENT_ALREADY_PAID` if the payment has been settled already.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "payPayment",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn pay(
    ctx: Context,
    Path(id): Path<payment::Id>,
    OptionalJson(req): OptionalJson<Pay>,
) -> Result<Json<Settled>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|p| {
            Json(Settled {
                message: "Payment completed".into(),
                receipt_number: p.receipt_number.clone(),
                payment: p.into(),
            })
        })
        .map_err(AsError::into_error)
}

/// Request of monthly payments generation.
#[derive(Debug, Default, Deserialize)]
pub struct Generation {
    /// Month in a `YYYY-MM` format, the next one if absent or malformed.
    pub month: Option<String>,

    /// Day of the month payments are due at, clamped into `1..=28`.
    #[serde(default, deserialize_with = "lenient_day")]
    pub day: Option<u8>,
}

/// Deserializes a day of month given either as a number or a numeric
/// string, clamping it into `1..=28`.
///
/// # Errors
///
/// If the value is neither a number nor a numeric string.
fn lenient_day<'de, D>(d: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Day {
        Number(i64),
        Text(String),
    }

    let day = match Option::<Day>::deserialize(d)? {
        None => return Ok(None),
        Some(Day::Number(n)) => n,
        Some(Day::Text(s)) => {
            s.trim().parse::<i64>().map_err(de::Error::custom)?
        }
    };
    u8::try_from(day.clamp(1, 28))
        .map(Some)
        .map_err(de::Error::custom)
}

impl Generation {
    /// Builds a [`command::GenerateMonthlyPayments`] out of this
    /// [`Generation`].
    fn into_command(self, actor: Actor) -> command::GenerateMonthlyPayments {
        command::GenerateMonthlyPayments {
            actor,
            month: self.month.as_deref().and_then(Month::parse_lenient),
            day: self.day,
        }
    }
}

/// Result of monthly payments generation.
#[derive(Clone, Debug, Serialize)]
pub struct Generated {
    /// Human-readable summary.
    pub message: String,

    /// Number of created payments.
    pub created: u64,

    /// Number of leases skipped as already billed.
    pub skipped: u64,

    /// Date the created payments are due at.
    pub due_date: payment::DueDate,
}

impl From<command::generate_monthly_payments::Output> for Generated {
    fn from(out: command::generate_monthly_payments::Output) -> Self {
        Self {
            message: format!(
                "{} payment(s) created, {} skipped",
                out.created, out.skipped,
            ),
            created: out.created,
            skipped: out.skipped,
            due_date: out.due_date,
        }
    }
}

/// Issues the monthly payment of every active lease in scope.
#[tracing::instrument(
    skip_all,
    fields(api.name = "generateMonthlyPayments", otel.name = api::SPAN_NAME),
)]
async fn generate_monthly(
    ctx: Context,
    OptionalJson(req): OptionalJson<Generation>,
) -> Result<Json<Generated>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor))
        .await
        .map(|out| Json(out.into()))
        .map_err(AsError::into_error)
}

/// Query parameters of the payments statistics.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatsFilter {
    /// Month in a `YYYY-MM` format, the current one by default.
    pub month: Option<String>,
}

/// Payments statistics over a month.
#[derive(Clone, Debug, Serialize)]
pub struct Stats {
    /// Month in a `YYYY-MM` format.
    pub month: String,

    /// Number of all the payments due in the month.
    pub total_payments: u64,

    /// Number of paid ones.
    pub paid_count: u64,

    /// Number of pending ones.
    pub pending_count: u64,

    /// Number of overdue ones.
    pub overdue_count: u64,

    /// Sum of the paid amounts.
    pub total_collected: Money,

    /// Sum of the unpaid amounts.
    pub total_pending: Money,

    /// Percentage of paid payments.
    pub collection_rate: Percent,
}

impl Stats {
    /// Renders the provided [`read::payment::Stats`] of a [`Month`].
    fn new(month: Month, stats: read::payment::Stats) -> Self {
        Self {
            month: month.to_string(),
            total_payments: stats.total,
            paid_count: stats.paid,
            pending_count: stats.pending,
            overdue_count: stats.overdue,
            total_collected: stats.total_collected,
            total_pending: stats.total_pending,
            collection_rate: stats.collection_rate,
        }
    }
}

/// Returns payments [`Stats`] of a month.
#[tracing::instrument(
    skip_all,
    fields(api.name = "paymentStats", otel.name = api::SPAN_NAME),
)]
async fn stats(
    ctx: Context,
    Query(filter): Query<StatsFilter>,
) -> Result<Json<Stats>, Error> {
    let actor = ctx.actor().await?;

    let month = filter
        .month
        .as_deref()
        .and_then(Month::parse_lenient)
        .unwrap_or_else(|| Date::today().month());
    ctx.service()
        .execute(query::payment::Stats::by(actor, Some(month)))
        .await
        .map(|stats| Json(Stats::new(month, stats)))
        .map_err(AsError::into_error)
}

/// Reminder sent about a payment.
#[derive(Clone, Debug, Serialize)]
pub struct Reminder {
    /// ID of this [`Reminder`].
    pub id: reminder::Id,

    /// ID of the reminded payment.
    pub payment_id: payment::Id,

    /// Kind of this [`Reminder`].
    pub reminder_type: reminder::Kind,

    /// Text of this [`Reminder`].
    pub message: reminder::Message,

    /// [`DateTime`] this [`Reminder`] was sent at.
    ///
    /// [`DateTime`]: common::DateTime
    pub sent_at: reminder::SendingDateTime,
}

impl From<service::domain::Reminder> for Reminder {
    fn from(r: service::domain::Reminder) -> Self {
        Self {
            id: r.id,
            payment_id: r.payment_id,
            reminder_type: r.kind,
            message: r.message,
            sent_at: r.sent_at,
        }
    }
}

/// Lists the reminders of a payment, the latest first.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "listReminders",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn reminders(
    ctx: Context,
    Path(id): Path<payment::Id>,
) -> Result<Json<Vec<Reminder>>, Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(query::payment::Reminders::by(actor, id))
        .await
        .map_err(AsError::into_error)
        .and_then(api::found)
        .map(|rs| Json(rs.into_iter().map(Into::into).collect()))
}

/// New reminder about a payment.
#[derive(Debug, Deserialize)]
pub struct NewReminder {
    /// Kind of the reminder.
    #[serde(rename = "reminder_type", alias = "kind")]
    pub kind: reminder::Kind,

    /// Custom text, composed from the payment if blank.
    pub message: Option<String>,
}

impl NewReminder {
    /// Builds a [`command::CreatePaymentReminder`] out of this
    /// [`NewReminder`].
    ///
    /// # Errors
    ///
    /// With `INVALID_FIELD` if the message is too long.
    fn into_command(
        self,
        actor: Actor,
        payment_id: payment::Id,
    ) -> Result<command::CreatePaymentReminder, Error> {
        let message = self.message.filter(|m| !m.trim().is_empty());
        Ok(command::CreatePaymentReminder {
            actor,
            payment_id,
            kind: self.kind,
            message: api::optional("message", message, reminder::Message::new)?,
        })
    }
}

/// Sends a reminder about an unpaid payment.
#[tracing::instrument(
    skip_all,
    fields(
        api.name = "createReminder",
        otel.name = api::SPAN_NAME,
        payment.id = %id,
    ),
)]
async fn remind(
    ctx: Context,
    Path(id): Path<payment::Id>,
    Json(req): Json<NewReminder>,
) -> Result<(StatusCode, Json<Reminder>), Error> {
    let actor = ctx.actor().await?;

    ctx.service()
        .execute(req.into_command(actor, id)?)
        .await
        .map(|r| (StatusCode::CREATED, Json(r.into())))
        .map_err(AsError::into_error)
}

define_error! {
    enum PaymentError {
        #[code = "PAYMENT_ALREADY_PAID"]
        #[status = CONFLICT]
        #[message = "Payment is already paid"]
        AlreadyPaid,

        #[code = "ASSIGNMENT_INACTIVE"]
        #[status = BAD_REQUEST]
        #[message = "Assignment is no longer active"]
        #[field = "assignment_id"]
        AssignmentInactive,
    }
}

impl AsError for payment::AlreadyPaid {
    fn try_as_error(&self) -> Option<Error> {
        Some(PaymentError::AlreadyPaid.into())
    }
}

impl AsError for command::create_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AssignmentInactive(_) => {
                Some(PaymentError::AssignmentInactive.into())
            }
            Self::AssignmentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::update_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AlreadyPaid(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PaymentDetailsRequired(field) => Some(Error {
                code: "PAYMENT_DETAILS_REQUIRED",
                status_code: StatusCode::BAD_REQUEST,
                field: Some(*field),
                backtrace: None,
                message: format!("`{field}` is required to mark as paid"),
            }),
            Self::PaymentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::record_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PaymentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::make_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AlreadyPaid(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PaymentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::create_payment_reminder::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AlreadyPaid(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
            Self::PaymentNotExists(_) => {
                Some(api::LookupError::NotFound.into())
            }
        }
    }
}

impl AsError for command::generate_monthly_payments::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Forbidden(e) => e.try_as_error(),
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{Money, Month};
    use service::{
        command,
        domain::{
            payment, reminder,
            user::{self, Role},
        },
        read, Actor,
    };

    use crate::AsError as _;

    use super::{
        Generation, NewReminder, Pay, PaymentsFilter, Settlement, Stats,
    };

    fn agent() -> Actor {
        Actor {
            id: user::Id::new(),
            role: Role::Agent,
        }
    }

    fn tenant() -> Actor {
        Actor {
            id: user::Id::new(),
            role: Role::Tenant,
        }
    }

    #[test]
    fn ignores_malformed_month() {
        let bad = PaymentsFilter {
            month: Some("2025-13".into()),
            ..PaymentsFilter::default()
        };
        assert!(bad.selector().unwrap().filter.month.is_none());

        let good = PaymentsFilter {
            month: Some("2025-03".into()),
            ..PaymentsFilter::default()
        };
        assert_eq!(
            good.selector().unwrap().filter.month,
            Month::new(2025, 3),
        );
    }

    #[test]
    fn falls_back_on_malformed_generation_month() {
        let req: Generation =
            serde_json::from_str(r#"{"month": "march"}"#).unwrap();
        assert!(req.into_command(agent()).month.is_none());

        let req: Generation =
            serde_json::from_str(r#"{"month": "2025-04", "day": 31}"#)
                .unwrap();
        let cmd = req.into_command(agent());
        assert_eq!(cmd.month, Month::new(2025, 4));
        assert_eq!(cmd.day, Some(28));
    }

    #[test]
    fn clamps_lenient_generation_day() {
        let req: Generation =
            serde_json::from_str(r#"{"month": "2025-07", "day": 300}"#)
                .unwrap();
        let cmd = req.into_command(agent());
        assert_eq!(cmd.month, Month::new(2025, 7));
        assert_eq!(cmd.day, Some(28));

        let req: Generation =
            serde_json::from_str(r#"{"month": "2025-08", "day": "10"}"#)
                .unwrap();
        let cmd = req.into_command(agent());
        assert_eq!(cmd.month, Month::new(2025, 8));
        assert_eq!(cmd.day, Some(10));

        let req: Generation = serde_json::from_str(r#"{"day": -4}"#).unwrap();
        assert_eq!(req.into_command(agent()).day, Some(1));

        let req: Generation = serde_json::from_str("{}").unwrap();
        assert_eq!(req.into_command(agent()).day, None);

        assert!(serde_json::from_str::<Generation>(r#"{"day": "x"}"#).is_err());
    }

    #[test]
    fn rejects_unknown_payment_method() {
        let req: Settlement = serde_json::from_str(
            r#"{"payment_method": "bitcoin", "notes": "late fee"}"#,
        )
        .unwrap();
        let err = req.into_command(agent(), payment::Id::new()).unwrap_err();
        assert_eq!(err.code, "INVALID_FIELD");
        assert_eq!(err.field, Some("payment_method"));

        let req: Pay =
            serde_json::from_str(r#"{"payment_method": "bitcoin"}"#).unwrap();
        let err = req.into_command(tenant(), payment::Id::new()).unwrap_err();
        assert_eq!(err.field, Some("payment_method"));
    }

    #[test]
    fn keeps_settlement_details() {
        let req: Settlement = serde_json::from_str(
            r#"{"payment_method": "cash", "notes": "late fee"}"#,
        )
        .unwrap();
        let cmd = req.into_command(agent(), payment::Id::new()).unwrap();
        assert_eq!(cmd.method, Some(payment::Method::Cash));
        assert_eq!(
            cmd.notes.map(|n| n.to_string()).as_deref(),
            Some("late fee"),
        );

        let cmd = Pay::default()
            .into_command(tenant(), payment::Id::new())
            .unwrap();
        assert!(cmd.method.is_none());
    }

    #[test]
    fn composes_blank_reminder_message() {
        let req: NewReminder = serde_json::from_str(
            r#"{"reminder_type": "overdue", "message": "  "}"#,
        )
        .unwrap();
        let cmd = req.into_command(agent(), payment::Id::new()).unwrap();

        assert_eq!(cmd.kind, reminder::Kind::Overdue);
        assert!(cmd.message.is_none());
    }

    #[test]
    fn renders_month_stats() {
        let stats = read::payment::Stats::aggregate([
            (payment::Status::Paid, 3, Money::from_str("3000").unwrap()),
            (payment::Status::Overdue, 1, Money::from_str("1000").unwrap()),
        ]);
        let json = serde_json::to_value(Stats::new(
            Month::new(2025, 3).unwrap(),
            stats,
        ))
        .unwrap();

        assert_eq!(json["month"], "2025-03");
        assert_eq!(json["total_payments"], 4);
        assert_eq!(json["total_pending"], "1000.00");
        assert_eq!(json["collection_rate"], 75.0);
    }

    #[test]
    fn maps_payment_errors() {
        let id = payment::Id::new();

        let err = command::make_payment::ExecutionError::AlreadyPaid(
            payment::AlreadyPaid(id),
        )
        .as_error();
        assert_eq!(err.code, "PAYMENT_ALREADY_PAID");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);

        let err =
            command::update_payment::ExecutionError::PaymentDetailsRequired(
                "payment_method",
            )
            .as_error();
        assert_eq!(err.code, "PAYMENT_DETAILS_REQUIRED");
        assert_eq!(err.field, Some("payment_method"));

        let err = command::create_payment::ExecutionError::AssignmentInactive(
            service::domain::assignment::Id::new(),
        )
        .as_error();
        assert_eq!(err.field, Some("assignment_id"));
    }
}
