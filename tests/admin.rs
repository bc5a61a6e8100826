//! The board's pages: the member register, payments, roles and sailings.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use seglarklubb::models::member::Member;
use seglarklubb::models::payment::Payment;
use seglarklubb::models::role::Role;
use seglarklubb::models::sailing::participant::Participant;
use seglarklubb::models::sailing::Sailing;

#[tokio::test]
async fn members_can_be_added_edited_and_removed() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;

    let page = app
        .post(
            "/members/new",
            &[
                ("email", "Nils@Example.org"),
                ("first_name", "Nils"),
                ("last_name", "Holm"),
                ("birth_year", "1990"),
                ("city", "Visby"),
            ],
        )
        .await;
    let nils = Member::with_email_opt("nils@example.org", &app.pool)
        .await
        .unwrap()
        .expect("the member was added");
    assert!(page.redirects_to(&format!("/members/{}", nils.id)));
    assert_eq!(nils.birth_year, Some(1990));
    assert!(!nils.has_login());

    let page = app.follow(page).await;
    assert!(page.body.contains("Nils Holm is added to the register"));

    let page = app.get("/members?q=holm").await;
    assert!(page.body.contains("Holm, Nils"));
    let page = app.get("/members?q=nobody").await;
    assert!(page.body.contains("No members found"));

    let page = app
        .post(
            &format!("/members/{}/edit", nils.id),
            &[
                ("email", "nils@example.org"),
                ("first_name", "Nils"),
                ("last_name", "Holmqvist"),
            ],
        )
        .await;
    assert!(page.redirects_to(&format!("/members/{}", nils.id)));
    let nils = Member::with_id(nils.id, &app.pool).await.unwrap();
    assert_eq!(nils.last_name, "Holmqvist");
    assert_eq!(nils.city, None);

    let page = app.post(&format!("/members/{}/delete", nils.id), &[]).await;
    assert!(page.redirects_to("/members"));
    assert!(Member::with_id_opt(nils.id, &app.pool).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_emails_are_flashed_back() {
    let mut app = TestApp::new().await;
    let admin = app.logged_in_admin().await;

    let page = app
        .post(
            "/members/new",
            &[
                ("email", admin.email.as_str()),
                ("first_name", "Stina"),
                ("last_name", "Kopia"),
            ],
        )
        .await;
    assert!(page.redirects_to("/members/new"));
    let page = app.follow(page).await;
    assert!(page.body.contains("Another member already has the email"));
}

#[tokio::test]
async fn admins_cannot_remove_themselves() {
    let mut app = TestApp::new().await;
    let admin = app.logged_in_admin().await;

    let page = app.post(&format!("/members/{}/delete", admin.id), &[]).await;
    assert!(page.redirects_to(&format!("/members/{}", admin.id)));
    assert!(Member::with_id_opt(admin.id, &app.pool).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_members_are_not_found() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;
    assert_eq!(app.get("/members/999").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn roles_are_assigned_once() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;
    let anna = app.member("anna@example.org", "Anna", false).await;
    let skipper = Role::with_name_opt("Skeppare", &app.pool)
        .await
        .unwrap()
        .expect("roles are seeded");
    let path = format!("/members/{}/roles", anna.id);
    let role_id = skipper.id.to_string();

    let page = app.post(&path, &[("role_id", &role_id)]).await;
    assert!(page.redirects_to(&format!("/members/{}", anna.id)));
    assert_eq!(anna.roles(&app.pool).await.unwrap().len(), 1);

    let page = app.post(&path, &[("role_id", &role_id)]).await;
    let page = app.follow(page).await;
    assert!(page.body.contains("already has the role Skeppare"));

    let remove = format!("/members/{}/roles/{}/delete", anna.id, skipper.id);
    app.post(&remove, &[]).await;
    assert!(anna.roles(&app.pool).await.unwrap().is_empty());

    let page = app.post(&remove, &[]).await;
    let page = app.follow(page).await;
    assert!(page.body.contains("does not have that role"));
}

#[tokio::test]
async fn roles_can_be_managed() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;

    let page = app
        .post("/roles", &[("name", "Navigatör"), ("description", "Plots the course")])
        .await;
    assert!(page.redirects_to("/roles"));
    let role = Role::with_name_opt("Navigatör", &app.pool)
        .await
        .unwrap()
        .expect("the role was added");

    let page = app.post("/roles", &[("name", "navigatör")]).await;
    let page = app.follow(page).await;
    assert!(page.body.contains("already exists"));

    let page = app
        .post(&format!("/roles/{}/edit", role.id), &[("name", "Navigator")])
        .await;
    assert!(page.redirects_to("/roles"));
    assert_eq!(Role::with_id(role.id, &app.pool).await.unwrap().name, "Navigator");

    app.post(&format!("/roles/{}/delete", role.id), &[]).await;
    assert!(Role::with_id_opt(role.id, &app.pool).await.unwrap().is_none());
}

#[tokio::test]
async fn payments_are_registered_and_listed() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;
    let anna = app.member("anna@example.org", "Anna", false).await;
    let path = format!("/members/{}/payments", anna.id);

    let page = app
        .post(
            &path,
            &[("amount", "350"), ("year", "2024"), ("paid_on", "2024-02-10")],
        )
        .await;
    assert!(page.redirects_to(&format!("/members/{}", anna.id)));
    assert_eq!(
        Payment::total_for_member_year(anna.id, 2024, &app.pool).await.unwrap(),
        350
    );

    let page = app.post(&path, &[("amount", "0"), ("year", "2024")]).await;
    let page = app.follow(page).await;
    assert!(page.body.contains("The amount must be more than zero"));

    let page = app.get("/payments?year=2024").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Berg, Anna"));
    assert!(page.body.contains("350 kr in total"));

    let payment = Payment::for_member(anna.id, &app.pool).await.unwrap().remove(0);
    let page = app.post(&format!("/payments/{}/delete", payment.id), &[]).await;
    assert!(page.redirects_to(&format!("/members/{}", anna.id)));
    assert!(Payment::for_member(anna.id, &app.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn sailings_are_planned_and_crewed() {
    let mut app = TestApp::new().await;
    app.logged_in_admin().await;
    let anna = app.member("anna@example.org", "Anna", false).await;

    let page = app
        .post(
            "/sailings/new",
            &[
                ("name", "Midsommarseglingen"),
                ("start_date", "2099-06-20"),
                ("end_date", "2099-06-22"),
                ("destination", "Sandhamn"),
            ],
        )
        .await;
    let sailing = Sailing::all(&app.pool).await.unwrap().remove(0);
    assert!(page.redirects_to(&format!("/sailings/{}", sailing.id)));

    let page = app
        .post(
            "/sailings/new",
            &[
                ("name", "Baklänges"),
                ("start_date", "2099-06-22"),
                ("end_date", "2099-06-20"),
            ],
        )
        .await;
    let page = app.follow(page).await;
    assert!(page.body.contains("end before it starts"));

    let crew = format!("/sailings/{}/participants", sailing.id);
    let member_id = anna.id.to_string();
    let page = app.post(&crew, &[("member_id", &member_id), ("role_id", "")]).await;
    assert!(page.redirects_to(&format!("/sailings/{}", sailing.id)));

    let page = app.post(&crew, &[("member_id", &member_id)]).await;
    let page = app.follow(page).await;
    assert!(page.body.contains("already part of the crew"));
    assert_eq!(Participant::for_sailing(sailing.id, &app.pool).await.unwrap().len(), 1);

    app.post(&format!("{crew}/{}/delete", anna.id), &[]).await;
    assert!(Participant::for_sailing(sailing.id, &app.pool).await.unwrap().is_empty());

    let page = app.post(&format!("/sailings/{}/delete", sailing.id), &[]).await;
    assert!(page.redirects_to("/sailings"));
    assert!(Sailing::with_id_opt(sailing.id, &app.pool).await.unwrap().is_none());
}

#[tokio::test]
async fn members_see_sailings_and_their_own_page() {
    let mut app = TestApp::new().await;
    let anna = app.logged_in_member().await;
    let id = Sailing::create(
        seglarklubb::models::sailing::NewSailing {
            name: "Höstseglingen".to_owned(),
            start_date: time::macros::date!(2099 - 09 - 12),
            end_date: time::macros::date!(2099 - 09 - 13),
            start_point: None,
            destination: Some("Utö".to_owned()),
            comments: None,
        },
        &app.pool,
    )
    .await
    .unwrap();
    Participant::add(id, anna.id, None, &app.pool).await.unwrap();

    let page = app.get("/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Höstseglingen"));
    assert!(page.body.contains("Your sailings"));

    let page = app.get(&format!("/sailings/{id}")).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Anna Berg"));
    assert!(!page.body.contains("Add to crew"));

    let page = app
        .post("/profile", &[("phone", "070-123 45 67"), ("city", "Nynäshamn")])
        .await;
    assert!(page.redirects_to("/profile"));
    let anna = Member::with_id(anna.id, &app.pool).await.unwrap();
    assert_eq!(anna.phone.as_deref(), Some("070-123 45 67"));
    assert_eq!(anna.city.as_deref(), Some("Nynäshamn"));
}
