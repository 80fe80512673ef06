//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_assignment;
pub mod create_payment;
pub mod create_payment_reminder;
pub mod create_property;
pub mod create_user;
pub mod create_user_session;
pub mod delete_property;
pub mod delete_user;
pub mod end_assignment;
pub mod generate_monthly_payments;
pub mod make_payment;
pub mod record_payment;
pub mod update_assignment;
pub mod update_payment;
pub mod update_property;
pub mod update_user;
pub mod update_user_password;

use common::{
    operations::{By, Lock, Select},
    Date, Month,
};
use tracerr::Traced;

use crate::{
    domain::{payment, Payment},
    infra::{database, Database},
    read::payment::ReceiptCount,
};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession,
    create_assignment::CreateAssignment, create_payment::CreatePayment,
    create_payment_reminder::CreatePaymentReminder,
    create_property::CreateProperty, create_user::CreateUser,
    create_user_session::CreateUserSession, delete_property::DeleteProperty,
    delete_user::DeleteUser, end_assignment::EndAssignment,
    generate_monthly_payments::GenerateMonthlyPayments,
    make_payment::MakePayment, record_payment::RecordPayment,
    update_assignment::UpdateAssignment, update_payment::UpdatePayment,
    update_property::UpdateProperty, update_user::UpdateUser,
    update_user_password::UpdateUserPassword,
};

/// Prepares the provided [`Payment`] for being persisted via the provided
/// transaction.
///
/// Re-derives its [`payment::Status`] and issues a [`payment::ReceiptNumber`]
/// if it has just been paid.
async fn prepare_payment<Tx>(
    tx: &Tx,
    payment: &mut Payment,
) -> Result<(), Traced<database::Error>>
where
    Tx: Database<
            Lock<By<ReceiptCount, Month>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<ReceiptCount, Month>>,
            Ok = ReceiptCount,
            Err = Traced<database::Error>,
        >,
{
    let today = Date::today();
    payment.derive_status(today);
    if !payment.needs_receipt() {
        return Ok(());
    }

    let month = today.month();
    // Receipts are numbered sequentially within a month.
    tx.execute(Lock(By::<ReceiptCount, _>::new(month)))
        .await
        .map_err(tracerr::wrap!())
        .map(drop)?;
    let count = tx
        .execute(Select(By::<ReceiptCount, _>::new(month)))
        .await
        .map_err(tracerr::wrap!())?;
    payment.receipt_number =
        Some(payment::ReceiptNumber::new(month, count.next()));

    Ok(())
}
