//! The member register, kept by the board.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentMember;
use crate::models::member::{Member, NewMember};
use crate::models::payment::Payment;
use crate::models::role::Role;
use crate::models::sailing::Sailing;
use crate::routes::{back_on_error, done, render};
use crate::session::PageContext;
use crate::state::AppState;
use crate::util::{current_time, current_year, non_empty, parse_optional_number, require, validate_email};

#[derive(Template)]
#[template(path = "members/list.html")]
struct MemberList {
    page: PageContext,
    members: Vec<Member>,
    query: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    q: String,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Query(search): Query<SearchQuery>,
) -> AppResult<Html<String>> {
    let members = if search.q.trim().is_empty() {
        Member::all(&state.pool).await?
    } else {
        Member::search(&search.q, &state.pool).await?
    };

    render(MemberList {
        page: PageContext::load(&session, Some(&admin)).await?,
        members,
        query: search.q,
    })
}

#[derive(Template)]
#[template(path = "members/show.html")]
struct MemberPage {
    page: PageContext,
    member: Member,
    roles: Vec<Role>,
    other_roles: Vec<Role>,
    payments: Vec<Payment>,
    sailings: Vec<Sailing>,
    year: i64,
    today: String,
}

pub async fn show(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let member = Member::with_id(id, &state.pool).await?;
    let roles = member.roles(&state.pool).await?;
    let other_roles = Role::all(&state.pool)
        .await?
        .into_iter()
        .filter(|role| roles.iter().all(|held| held.id != role.id))
        .collect();

    render(MemberPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        payments: Payment::for_member(id, &state.pool).await?,
        sailings: Sailing::for_member(id, &state.pool).await?,
        year: current_year(),
        today: current_time().date().to_string(),
        member,
        roles,
        other_roles,
    })
}

/// What goes into the add and edit forms; every field arrives as text.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct MemberForm {
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    street: String,
    postal_code: String,
    city: String,
    birth_year: String,
    skill: String,
    comments: String,
    is_admin: Option<String>,
}

impl TryFrom<MemberForm> for NewMember {
    type Error = AppError;

    fn try_from(form: MemberForm) -> AppResult<Self> {
        Ok(NewMember {
            email: validate_email(&form.email)?,
            first_name: require("First name", form.first_name)?,
            last_name: require("Last name", form.last_name)?,
            phone: non_empty(form.phone),
            street: non_empty(form.street),
            postal_code: non_empty(form.postal_code),
            city: non_empty(form.city),
            birth_year: parse_optional_number("Birth year", &form.birth_year)?,
            skill: non_empty(form.skill),
            comments: non_empty(form.comments),
            is_admin: form.is_admin.is_some(),
        })
    }
}

impl From<&Member> for MemberForm {
    fn from(member: &Member) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        MemberForm {
            email: member.email.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            phone: text(&member.phone),
            street: text(&member.street),
            postal_code: text(&member.postal_code),
            city: text(&member.city),
            birth_year: member.birth_year.map(|year| year.to_string()).unwrap_or_default(),
            skill: text(&member.skill),
            comments: text(&member.comments),
            is_admin: member.is_admin.then(|| "on".to_owned()),
        }
    }
}

#[derive(Template)]
#[template(path = "members/form.html")]
struct MemberFormPage {
    page: PageContext,
    title: String,
    action: String,
    values: MemberForm,
}

pub async fn new_page(
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    render(MemberFormPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        title: "New member".to_owned(),
        action: "/members/new".to_owned(),
        values: MemberForm::default(),
    })
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let new_member = NewMember::try_from(form)?;
        let name = format!("{} {}", new_member.first_name, new_member.last_name);
        let id = Member::create(new_member, &state.pool).await?;
        tracing::info!(member = id, "member added");
        done(&session, format!("{name} is added to the register"), &format!("/members/{id}")).await
    }
    .await;

    back_on_error(&session, "/members/new", result).await
}

pub async fn edit_page(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let member = Member::with_id(id, &state.pool).await?;
    render(MemberFormPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        title: format!("Edit {}", member.full_name()),
        action: format!("/members/{id}/edit"),
        values: MemberForm::from(&member),
    })
}

pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<MemberForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let update = NewMember::try_from(form)?;
        if id == admin.id && !update.is_admin {
            return Err(AppError::bad_request(
                "You can't take away your own admin rights",
            ));
        }

        Member::update(id, update, &state.pool).await?;
        done(&session, "The member is saved", &format!("/members/{id}")).await
    }
    .await;

    back_on_error(&session, &format!("/members/{id}/edit"), result).await
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        if id == admin.id {
            return Err(AppError::bad_request("You can't remove yourself from the register"));
        }

        let member = Member::with_id(id, &state.pool).await?;
        Member::delete(id, &state.pool).await?;
        tracing::info!(member = id, by = admin.id, "member deleted");
        done(&session, format!("{} is removed from the register", member.full_name()), "/members").await
    }
    .await;

    back_on_error(&session, &format!("/members/{id}"), result).await
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RoleForm {
    role_id: String,
}

pub async fn add_role(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    let back = format!("/members/{id}");
    let result: AppResult<Response> = async {
        let role_id = parse_optional_number("Role", &form.role_id)?
            .ok_or_else(|| AppError::bad_request("Pick a role to add"))?;
        Role::assign(id, role_id, &state.pool).await?;
        done(&session, "The role is added", &back).await
    }
    .await;

    back_on_error(&session, &back, result).await
}

pub async fn remove_role(
    State(state): State<AppState>,
    session: Session,
    Path((id, role_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let back = format!("/members/{id}");
    let result: AppResult<Response> = async {
        Role::unassign(id, role_id, &state.pool).await?;
        done(&session, "The role is removed", &back).await
    }
    .await;

    back_on_error(&session, &back, result).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> MemberForm {
        MemberForm {
            email: " Anna@Example.org ".to_owned(),
            first_name: "Anna".to_owned(),
            last_name: "Berg".to_owned(),
            birth_year: "1987".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn forms_become_members() {
        let member = NewMember::try_from(form()).unwrap();
        assert_eq!(member.email, "anna@example.org");
        assert_eq!(member.birth_year, Some(1987));
        assert_eq!(member.phone, None);
        assert!(!member.is_admin);
    }

    #[test]
    fn names_and_numbers_are_checked() {
        let nameless = MemberForm {
            first_name: "  ".to_owned(),
            ..form()
        };
        assert!(NewMember::try_from(nameless).is_err());

        let bad_year = MemberForm {
            birth_year: "nittonhundra".to_owned(),
            ..form()
        };
        assert!(NewMember::try_from(bad_year).is_err());
    }
}
