use askama::Template;

use crate::email::{Email, Recipient};
use crate::models::member::Member;

#[derive(Template)]
#[template(path = "email/reset-password.html")]
pub struct ResetPasswordEmail<'a> {
    pub member: &'a Member,
    pub link: String,
    pub valid_minutes: i64,
}

impl<'a> Email for ResetPasswordEmail<'a> {
    fn subject(&self) -> String {
        "Reset your password".to_owned()
    }

    fn recipient(&self) -> Recipient {
        Recipient {
            name: self.member.full_name(),
            address: self.member.email.clone(),
        }
    }
}
