use askama::Template;

use crate::email::{Email, Recipient};
use crate::models::member::Member;

#[derive(Template)]
#[template(path = "email/activation.html")]
pub struct ActivationEmail<'a> {
    pub member: &'a Member,
    pub link: String,
    pub valid_minutes: i64,
}

impl<'a> Email for ActivationEmail<'a> {
    fn subject(&self) -> String {
        "Activate your membership login".to_owned()
    }

    fn recipient(&self) -> Recipient {
        Recipient {
            name: self.member.full_name(),
            address: self.member.email.clone(),
        }
    }
}
