//! Sailing trips. Every member can see them and their crews; the board
//! arranges them.

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentMember;
use crate::models::member::Member;
use crate::models::role::Role;
use crate::models::sailing::participant::Participant;
use crate::models::sailing::{NewSailing, Sailing};
use crate::routes::{back_on_error, done, render};
use crate::session::PageContext;
use crate::state::AppState;
use crate::util::{current_time, non_empty, parse_date, parse_optional_number, require};

#[derive(Template)]
#[template(path = "sailings/list.html")]
struct SailingList {
    page: PageContext,
    upcoming: Vec<Sailing>,
    past: Vec<Sailing>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    let today = current_time().date();
    let upcoming = Sailing::upcoming(today, &state.pool).await?;
    let past = Sailing::all(&state.pool)
        .await?
        .into_iter()
        .filter(|sailing| sailing.end_date < today)
        .collect();

    render(SailingList {
        page: PageContext::load(&session, Some(&member)).await?,
        upcoming,
        past,
    })
}

#[derive(Template)]
#[template(path = "sailings/show.html")]
struct SailingPage {
    page: PageContext,
    sailing: Sailing,
    crew: Vec<Participant>,
    /// Members who could still join, only listed for admins
    others: Vec<Member>,
    roles: Vec<Role>,
}

pub async fn show(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let sailing = Sailing::with_id(id, &state.pool).await?;
    let crew = Participant::for_sailing(id, &state.pool).await?;

    let (others, roles) = if member.is_admin {
        let others = Member::all(&state.pool)
            .await?
            .into_iter()
            .filter(|candidate| crew.iter().all(|place| place.member_id != candidate.id))
            .collect();
        (others, Role::all(&state.pool).await?)
    } else {
        (Vec::new(), Vec::new())
    };

    render(SailingPage {
        page: PageContext::load(&session, Some(&member)).await?,
        sailing,
        crew,
        others,
        roles,
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SailingForm {
    name: String,
    start_date: String,
    end_date: String,
    start_point: String,
    destination: String,
    comments: String,
}

impl TryFrom<SailingForm> for NewSailing {
    type Error = AppError;

    fn try_from(form: SailingForm) -> AppResult<Self> {
        let start_date = parse_date("Start date", &form.start_date)?;
        // Day trips can leave the end date out
        let end_date = if form.end_date.trim().is_empty() {
            start_date
        } else {
            parse_date("End date", &form.end_date)?
        };

        Ok(NewSailing {
            name: require("Name", form.name)?,
            start_date,
            end_date,
            start_point: non_empty(form.start_point),
            destination: non_empty(form.destination),
            comments: non_empty(form.comments),
        })
    }
}

impl From<&Sailing> for SailingForm {
    fn from(sailing: &Sailing) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        SailingForm {
            name: sailing.name.clone(),
            start_date: sailing.start_date.to_string(),
            end_date: sailing.end_date.to_string(),
            start_point: text(&sailing.start_point),
            destination: text(&sailing.destination),
            comments: text(&sailing.comments),
        }
    }
}

#[derive(Template)]
#[template(path = "sailings/form.html")]
struct SailingFormPage {
    page: PageContext,
    title: String,
    action: String,
    values: SailingForm,
}

pub async fn new_page(
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    render(SailingFormPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        title: "New sailing".to_owned(),
        action: "/sailings/new".to_owned(),
        values: SailingForm::default(),
    })
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SailingForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let id = Sailing::create(NewSailing::try_from(form)?, &state.pool).await?;
        tracing::info!(sailing = id, "sailing added");
        done(&session, "The sailing is added", &format!("/sailings/{id}")).await
    }
    .await;

    back_on_error(&session, "/sailings/new", result).await
}

pub async fn edit_page(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let sailing = Sailing::with_id(id, &state.pool).await?;
    render(SailingFormPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        title: format!("Edit {}", sailing.name),
        action: format!("/sailings/{id}/edit"),
        values: SailingForm::from(&sailing),
    })
}

pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<SailingForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        Sailing::update(id, NewSailing::try_from(form)?, &state.pool).await?;
        done(&session, "The sailing is saved", &format!("/sailings/{id}")).await
    }
    .await;

    back_on_error(&session, &format!("/sailings/{id}/edit"), result).await
}

pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let sailing = Sailing::with_id(id, &state.pool).await?;
        Sailing::delete(id, &state.pool).await?;
        tracing::info!(sailing = id, "sailing deleted");
        done(&session, format!("{} is cancelled", sailing.name), "/sailings").await
    }
    .await;

    back_on_error(&session, &format!("/sailings/{id}"), result).await
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ParticipantForm {
    member_id: String,
    role_id: String,
}

pub async fn add_participant(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<ParticipantForm>,
) -> AppResult<Response> {
    let back = format!("/sailings/{id}");
    let result: AppResult<Response> = async {
        let member_id = parse_optional_number("Member", &form.member_id)?
            .ok_or_else(|| AppError::bad_request("Pick a member to add to the crew"))?;
        let role_id = parse_optional_number("Crew position", &form.role_id)?;

        Participant::add(id, member_id, role_id, &state.pool).await?;
        done(&session, "The crew is updated", &back).await
    }
    .await;

    back_on_error(&session, &back, result).await
}

pub async fn remove_participant(
    State(state): State<AppState>,
    session: Session,
    Path((id, member_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let back = format!("/sailings/{id}");
    let result: AppResult<Response> = async {
        Participant::remove(id, member_id, &state.pool).await?;
        done(&session, "The crew is updated", &back).await
    }
    .await;

    back_on_error(&session, &back, result).await
}
