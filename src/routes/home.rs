use askama::Template;
use axum::extract::State;
use axum::response::{Html, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppResult;
use crate::middleware::CurrentMember;
use crate::models::member::{ContactUpdate, Member};
use crate::models::payment::Payment;
use crate::models::role::Role;
use crate::models::sailing::Sailing;
use crate::routes::{back_on_error, done, render};
use crate::session::PageContext;
use crate::state::AppState;
use crate::util::{current_time, current_year, non_empty};

#[derive(Template)]
#[template(path = "home.html")]
struct Dashboard {
    page: PageContext,
    member: Member,
    roles: Vec<Role>,
    payments: Vec<Payment>,
    year: i64,
    paid_this_year: i64,
    upcoming: Vec<Sailing>,
    my_sailings: Vec<Sailing>,
}

/// The member's own page: their details, what they have paid and where the
/// boats are going next.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    let year = current_year();
    let today = current_time().date();

    render(Dashboard {
        page: PageContext::load(&session, Some(&member)).await?,
        roles: member.roles(&state.pool).await?,
        payments: Payment::for_member(member.id, &state.pool).await?,
        paid_this_year: Payment::total_for_member_year(member.id, year, &state.pool).await?,
        year,
        upcoming: Sailing::upcoming(today, &state.pool).await?,
        my_sailings: Sailing::for_member(member.id, &state.pool).await?,
        member,
    })
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfilePage {
    page: PageContext,
    member: Member,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ProfileForm {
    phone: String,
    street: String,
    postal_code: String,
    city: String,
    skill: String,
}

impl From<ProfileForm> for ContactUpdate {
    fn from(form: ProfileForm) -> Self {
        ContactUpdate {
            phone: non_empty(form.phone),
            street: non_empty(form.street),
            postal_code: non_empty(form.postal_code),
            city: non_empty(form.city),
            skill: non_empty(form.skill),
        }
    }
}

pub async fn profile_page(
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    render(ProfilePage {
        page: PageContext::load(&session, Some(&member)).await?,
        member,
    })
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        Member::update_contact(member.id, form.into(), &state.pool).await?;
        done(&session, "Your details are saved", "/profile").await
    }
    .await;

    back_on_error(&session, "/profile", result).await
}
