use askama::Template;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppResult;
use crate::middleware::CurrentMember;
use crate::models::member::Member;
use crate::models::role::{NewRole, Role};
use crate::routes::{back_on_error, done, render};
use crate::session::PageContext;
use crate::state::AppState;
use crate::util::{non_empty, require};

struct RoleRow {
    role: Role,
    holders: usize,
}

#[derive(Template)]
#[template(path = "roles/list.html")]
struct RoleList {
    page: PageContext,
    roles: Vec<RoleRow>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
) -> AppResult<Html<String>> {
    let mut roles = Vec::new();
    for role in Role::all(&state.pool).await? {
        let holders = Member::with_role(role.id, &state.pool).await?.len();
        roles.push(RoleRow { role, holders });
    }

    render(RoleList {
        page: PageContext::load(&session, Some(&admin)).await?,
        roles,
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RoleForm {
    name: String,
    description: String,
}

impl RoleForm {
    fn into_new_role(self) -> AppResult<NewRole> {
        Ok(NewRole {
            name: require("Name", self.name)?,
            description: non_empty(self.description),
        })
    }
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let role = form.into_new_role()?;
        let name = role.name.clone();
        Role::create(role, &state.pool).await?;
        done(&session, format!("The role {name} is added"), "/roles").await
    }
    .await;

    back_on_error(&session, "/roles", result).await
}

#[derive(Template)]
#[template(path = "roles/form.html")]
struct RoleFormPage {
    page: PageContext,
    role: Role,
    holders: Vec<Member>,
}

pub async fn edit_page(
    State(state): State<AppState>,
    Extension(CurrentMember(admin)): Extension<CurrentMember>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let role = Role::with_id(id, &state.pool).await?;
    render(RoleFormPage {
        page: PageContext::load(&session, Some(&admin)).await?,
        holders: Member::with_role(id, &state.pool).await?,
        role,
    })
}

pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        Role::update(id, form.into_new_role()?, &state.pool).await?;
        done(&session, "The role is saved", "/roles").await
    }
    .await;

    back_on_error(&session, &format!("/roles/{id}/edit"), result).await
}

pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let result: AppResult<Response> = async {
        let role = Role::with_id(id, &state.pool).await?;
        Role::delete(id, &state.pool).await?;
        tracing::info!(role = id, "role deleted");
        done(&session, format!("The role {} is removed", role.name), "/roles").await
    }
    .await;

    back_on_error(&session, "/roles", result).await
}
