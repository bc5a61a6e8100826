use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentMember;
use crate::models::member::Member;
use crate::models::payment::{NewPayment, Payment, PaymentWithMember};
use crate::routes::{back_on_error, done, render};
use crate::session::PageContext;
use crate::state::AppState;
use crate::util::{current_time, current_year, non_empty, parse_date, parse_optional_number};

struct YearChoice {
    year: i64,
    selected: bool,
}

#[derive(Template)]
#[template(path = "payments/list.html")]
struct PaymentList {
    page: PageContext,
    year: i64,
    years: Vec<YearChoice>,
    payments: Vec<PaymentWithMember>,
    total: i64,
    unpaid: Vec<Member>,
}

#[derive(Deserialize)]
pub struct YearQuery {
    year: Option<i64>,
}

/// Everything paid for a membership year, and who hasn't paid yet.
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Query(query): Query<YearQuery>,
) -> AppResult<Html<String>> {
    let year = query.year.unwrap_or_else(current_year);
    let mut years = Payment::years(&state.pool).await?;
    if !years.contains(&year) {
        years.push(year);
        years.sort_unstable_by(|a, b| b.cmp(a));
    }

    let payments = Payment::for_year(year, &state.pool).await?;
    render(PaymentList {
        page: PageContext::load(&session, Some(&admin)).await?,
        total: payments.iter().map(|paid| paid.payment.amount).sum(),
        unpaid: Payment::members_without_payment(year, &state.pool).await?,
        years: years
            .into_iter()
            .map(|other| YearChoice {
                year: other,
                selected: other == year,
            })
            .collect(),
        year,
        payments,
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PaymentForm {
    amount: String,
    year: String,
    paid_on: String,
    description: String,
}

impl PaymentForm {
    fn into_new_payment(self, member_id: i64) -> AppResult<NewPayment> {
        let amount = parse_optional_number("Amount", &self.amount)?
            .ok_or_else(|| AppError::bad_request("Amount is required"))?;
        let year = parse_optional_number("Year", &self.year)?.unwrap_or_else(current_year);
        let paid_on = if self.paid_on.trim().is_empty() {
            current_time().date()
        } else {
            parse_date("Paid on", &self.paid_on)?
        };

        Ok(NewPayment {
            member_id,
            amount,
            year,
            paid_on,
            description: non_empty(self.description),
        })
    }
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Path(member_id): Path<i64>,
    Form(form): Form<PaymentForm>,
) -> AppResult<Response> {
    let back = format!("/members/{member_id}");
    let result: AppResult<Response> = async {
        let payment = form.into_new_payment(member_id)?;
        let (amount, year) = (payment.amount, payment.year);
        Payment::create(payment, &state.pool).await?;
        tracing::info!(member = member_id, amount, year, "payment registered");
        done(&session, format!("{amount} kr for {year} is registered"), &back).await
    }
    .await;

    back_on_error(&session, &back, result).await
}

pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let payment = Payment::with_id(id, &state.pool).await?;
        Payment::delete(id, &state.pool).await?;
        tracing::info!(payment = id, member = payment.member_id, "payment deleted");
        done(
            &session,
            "The payment is removed",
            &format!("/members/{}", payment.member_id),
        )
        .await
    }
    .await;

    back_on_error(&session, "/payments", result).await
}
