//! The login workflow: registration with email activation, password resets
//! and checking credentials.
//!
//! Members are entered into the register by the board, so registering doesn't
//! create a member. It creates a login for an existing one: the chosen password
//! waits in an activation token until the member follows the emailed link.

use crate::email::activation::ActivationEmail;
use crate::email::reset_password::ResetPasswordEmail;
use crate::email::send_email;
use crate::error::{AppError, AppResult};
use crate::models::member::auth_token::{AuthToken, TokenKind};
use crate::models::member::Member;
use crate::state::AppState;
use crate::util::{hash_password, validate_email, validate_new_password};

pub struct Registration {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Starts a registration, emailing an activation link if the email belongs to
/// a member without a login.
///
/// Succeeds quietly for unknown emails, so the form can't be used to find out
/// who is a member.
pub async fn register(state: &AppState, registration: Registration) -> AppResult<()> {
    let email = validate_email(&registration.email)?;
    validate_new_password(&registration.password, &registration.password_confirmation)?;

    let member = match Member::with_email_opt(&email, &state.pool).await? {
        Some(member) if !member.has_login() => member,
        Some(_) => {
            tracing::info!(%email, "registration for a member who already has a login");
            return Ok(());
        }
        None => {
            tracing::info!(%email, "registration for an unknown email");
            return Ok(());
        }
    };

    let pass_hash = hash_password(&registration.password, state.config.password_cost).await?;
    AuthToken::purge_expired(state.config.token_ttl, &state.pool).await?;
    let token = AuthToken::issue(&email, TokenKind::Activate, Some(&pass_hash), &state.pool).await?;

    let email = ActivationEmail {
        member: &member,
        link: state.link(&format!("/activate/{token}")),
        valid_minutes: state.config.token_ttl.whole_minutes(),
    };
    send_email(state.mailer.as_ref(), email).await?;

    Ok(())
}

/// Uses up an activation token, installing the password chosen at registration.
pub async fn activate(state: &AppState, token: &str) -> AppResult<Member> {
    let auth_token =
        AuthToken::consume(token, TokenKind::Activate, state.config.token_ttl, &state.pool).await?;
    let pass_hash = auth_token
        .pass_hash
        .ok_or_else(|| anyhow::anyhow!("activation token {} has no password", auth_token.id))?;

    let member = Member::with_email_opt(&auth_token.email, &state.pool)
        .await?
        .ok_or_else(|| AppError::bad_request("The member for this link no longer exists"))?;
    if member.has_login() {
        return Err(AppError::bad_request(
            "This login is already activated, you can log in right away",
        ));
    }

    Member::set_password(&member.email, &pass_hash, &state.pool).await?;
    tracing::info!(email = %member.email, "login activated");

    Member::with_id(member.id, &state.pool).await
}

/// Emails a password reset link if the email belongs to a member with a login.
///
/// Like [register], it succeeds quietly for unknown emails.
pub async fn request_password_reset(state: &AppState, email: &str) -> AppResult<()> {
    let email = validate_email(email)?;
    let member = match Member::with_email_opt(&email, &state.pool).await? {
        Some(member) if member.has_login() => member,
        _ => {
            tracing::info!(%email, "password reset for an email without a login");
            return Ok(());
        }
    };

    AuthToken::purge_expired(state.config.token_ttl, &state.pool).await?;
    let token = AuthToken::issue(&email, TokenKind::Reset, None, &state.pool).await?;

    let email = ResetPasswordEmail {
        member: &member,
        link: state.link(&format!("/reset-password/{token}")),
        valid_minutes: state.config.token_ttl.whole_minutes(),
    };
    send_email(state.mailer.as_ref(), email).await?;

    Ok(())
}

/// Checks that a reset link is still good before showing its form.
pub async fn check_reset_token(state: &AppState, token: &str) -> AppResult<()> {
    AuthToken::find_valid(token, TokenKind::Reset, state.config.token_ttl, &state.pool).await?;
    Ok(())
}

/// Sets a new password from a reset link. The password is checked before the
/// link is used up, so a typo doesn't cost the member their link.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    password: &str,
    password_confirmation: &str,
) -> AppResult<()> {
    validate_new_password(password, password_confirmation)?;

    let auth_token =
        AuthToken::consume(token, TokenKind::Reset, state.config.token_ttl, &state.pool).await?;
    let pass_hash = hash_password(password, state.config.password_cost).await?;
    Member::set_password(&auth_token.email, &pass_hash, &state.pool)
        .await
        .map_err(|error| match error {
            AppError::NotFound => AppError::bad_request("The member for this link no longer exists"),
            other => other,
        })?;
    tracing::info!(email = %auth_token.email, "password reset");

    Ok(())
}

/// Checks a login attempt.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<Member> {
    match Member::login(email, password, &state.pool).await? {
        Some(member) => {
            tracing::info!(email = %member.email, "member logged in");
            Ok(member)
        }
        None => {
            tracing::info!(email = %email.trim(), "failed login attempt");
            Err(AppError::bad_request("Wrong email or password"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::config::Config;
    use crate::email::{Mailer, OutgoingEmail};
    use crate::models::testing::{new_member, pool};

    #[derive(Default)]
    struct Outbox(Mutex<Vec<OutgoingEmail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn deliver(&self, email: OutgoingEmail) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(email);
            Ok(())
        }
    }

    impl Outbox {
        fn last_token(&self, path: &str) -> String {
            let sent = self.0.lock().unwrap();
            let html = &sent.last().expect("an email was sent").html;
            let start = html.find(path).expect("the email has a link") + path.len();
            html[start..]
                .chars()
                .take_while(char::is_ascii_alphanumeric)
                .collect()
        }

        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    async fn state() -> (AppState, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let state = AppState::with_mailer(pool().await, Config::for_testing(), outbox.clone());
        Member::create(new_member("anna@example.org", "Anna", "Berg"), &state.pool)
            .await
            .unwrap();
        (state, outbox)
    }

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            email: email.to_owned(),
            password: password.to_owned(),
            password_confirmation: password.to_owned(),
        }
    }

    #[tokio::test]
    async fn registration_activates_the_chosen_password() {
        let (state, outbox) = state().await;
        register(&state, registration("Anna@Example.org", "segla hela dagen"))
            .await
            .unwrap();
        assert_eq!(outbox.count(), 1);
        assert!(login(&state, "anna@example.org", "segla hela dagen").await.is_err());

        let token = outbox.last_token("/activate/");
        let member = activate(&state, &token).await.unwrap();
        assert!(member.has_login());
        assert!(login(&state, "anna@example.org", "segla hela dagen").await.is_ok());

        assert!(activate(&state, &token).await.is_err());
    }

    #[tokio::test]
    async fn unknown_and_activated_emails_get_no_email() {
        let (state, outbox) = state().await;
        register(&state, registration("nobody@example.org", "segla hela dagen"))
            .await
            .unwrap();
        assert_eq!(outbox.count(), 0);

        register(&state, registration("anna@example.org", "segla hela dagen"))
            .await
            .unwrap();
        activate(&state, &outbox.last_token("/activate/")).await.unwrap();

        register(&state, registration("anna@example.org", "ett annat lösen"))
            .await
            .unwrap();
        assert_eq!(outbox.count(), 1);
    }

    #[tokio::test]
    async fn weak_passwords_are_rejected_before_anything_is_sent() {
        let (state, outbox) = state().await;
        let mut mismatched = registration("anna@example.org", "segla hela dagen");
        mismatched.password_confirmation = "segla halva dagen".to_owned();

        assert!(register(&state, registration("anna@example.org", "kort")).await.is_err());
        assert!(register(&state, mismatched).await.is_err());
        assert_eq!(outbox.count(), 0);
    }

    #[tokio::test]
    async fn password_resets_replace_the_password_once() {
        let (state, outbox) = state().await;
        request_password_reset(&state, "anna@example.org").await.unwrap();
        assert_eq!(outbox.count(), 0, "members without a login get no reset link");

        register(&state, registration("anna@example.org", "segla hela dagen"))
            .await
            .unwrap();
        activate(&state, &outbox.last_token("/activate/")).await.unwrap();

        request_password_reset(&state, "anna@example.org").await.unwrap();
        let token = outbox.last_token("/reset-password/");
        check_reset_token(&state, &token).await.unwrap();

        assert!(reset_password(&state, &token, "nytt lösen", "nytt lösem").await.is_err());
        reset_password(&state, &token, "nytt lösenord", "nytt lösenord")
            .await
            .unwrap();

        assert!(login(&state, "anna@example.org", "segla hela dagen").await.is_err());
        assert!(login(&state, "anna@example.org", "nytt lösenord").await.is_ok());
        assert!(check_reset_token(&state, &token).await.is_err());
        assert!(reset_password(&state, &token, "tredje lösenordet", "tredje lösenordet")
            .await
            .is_err());
    }
}
