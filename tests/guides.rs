#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use common::TestContext;
use guildsite::guide::count_by_author;
use guildsite::orm::guide_editors;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

fn guide_form(title: &str, content: &str, editors: &[i32]) -> Vec<(String, String)> {
    let mut form = vec![
        ("title".to_owned(), title.to_owned()),
        ("overview".to_owned(), format!("All about {}", title)),
        ("content".to_owned(), content.to_owned()),
    ];
    for editor in editors {
        form.push(("editors".to_owned(), editor.to_string()));
    }
    form
}

fn guide_id_from(location: &str) -> i32 {
    location
        .trim_start_matches("/guides/")
        .parse()
        .expect("guide id in Location")
}

async fn editors_of(ctx: &TestContext, guide_id: i32) -> Vec<i32> {
    let mut ids: Vec<i32> = guide_editors::Entity::find()
        .filter(guide_editors::Column::GuideId.eq(guide_id))
        .all(ctx.db.get_ref())
        .await
        .expect("editor query")
        .into_iter()
        .map(|row| row.user_id)
        .collect();
    ids.sort_unstable();
    ids
}

macro_rules! create_guide {
    ($app:expr, $cookie:expr, $form:expr) => {{
        let req = test::TestRequest::post()
            .uri("/guides/create")
            .cookie($cookie.clone())
            .set_form(&$form)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "guide creation");
        guide_id_from(&common::location(&resp))
    }};
}

macro_rules! post_form {
    ($app:expr, $cookie:expr, $uri:expr, $form:expr) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .cookie($cookie.clone())
            .set_form(&$form)
            .to_request();
        test::call_service(&$app, req).await.status()
    }};
}

macro_rules! get_status {
    ($app:expr, $uri:expr) => {{
        let req = test::TestRequest::get().uri($uri).to_request();
        test::call_service(&$app, req).await.status()
    }};
    ($app:expr, $cookie:expr, $uri:expr) => {{
        let req = test::TestRequest::get()
            .uri($uri)
            .cookie($cookie.clone())
            .to_request();
        test::call_service(&$app, req).await.status()
    }};
}

#[actix_rt::test]
async fn test_anonymous_browsing() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    assert_eq!(get_status!(app, "/guides/"), StatusCode::OK);
    assert_eq!(get_status!(app, "/guides/999"), StatusCode::NOT_FOUND);
    assert_eq!(get_status!(app, "/guides/create"), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/guides/create")
        .set_form(&guide_form("Lifetimes", "text", &[]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.guide_count().await, 0);
}

#[actix_rt::test]
async fn test_login_checked_before_existence() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    assert_eq!(get_status!(app, "/guides/999/edit"), StatusCode::FORBIDDEN);
    assert_eq!(get_status!(app, "/guides/999/delete"), StatusCode::FORBIDDEN);

    let cookie = login!(app, 1);
    assert_eq!(get_status!(app, cookie, "/guides/999/edit"), StatusCode::NOT_FOUND);
    assert_eq!(get_status!(app, cookie, "/guides/999/delete"), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_non_member_cannot_create() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let cookie = login!(app, 2);
    assert_eq!(get_status!(app, cookie, "/guides/create"), StatusCode::FORBIDDEN);
    let status = post_form!(app, cookie, "/guides/create", guide_form("Closures", "text", &[]));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.guide_count().await, 0);
}

#[actix_rt::test]
async fn test_member_creates_guide() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    assert_eq!(get_status!(app, cookie, "/guides/create"), StatusCode::OK);

    let guide_id = create_guide!(
        app,
        cookie,
        guide_form("Ownership Basics", "Values have **one** owner.", &[])
    );
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.author_id, ctx.user_id(1).await);
    assert_eq!(guide.content_raw, "Values have **one** owner.");
    assert!(guide.content_rendered.contains("<strong>one</strong>"));
    assert_eq!(guide.pub_datetime, guide.edit_datetime);

    let req = test::TestRequest::get()
        .uri(&format!("/guides/{}", guide_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::text(test::read_body(resp).await);
    assert!(body.contains("Ownership Basics"));
    assert!(body.contains("<strong>one</strong>"));

    let req = test::TestRequest::get().uri("/guides/").to_request();
    let resp = test::call_service(&app, req).await;
    let body = common::text(test::read_body(resp).await);
    assert!(body.contains("Ownership Basics"));
}

#[actix_rt::test]
async fn test_rendered_content_is_sanitized() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    let guide_id = create_guide!(
        app,
        cookie,
        guide_form("Escaping", "<script>alert(1)</script>\n\nSafe text", &[])
    );
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert!(!guide.content_rendered.contains("<script"));
    assert!(guide.content_rendered.contains("Safe text"));
}

#[actix_rt::test]
async fn test_invalid_guide_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    let status = post_form!(app, cookie, "/guides/create", guide_form("   ", "text", &[]));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let long_title = "t".repeat(101);
    let status = post_form!(app, cookie, "/guides/create", guide_form(&long_title, "text", &[]));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let status = post_form!(app, cookie, "/guides/create", guide_form("Empty", "", &[]));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(ctx.guide_count().await, 0);
}

/// Author 1 and editor 2 are members; 3 has signed in but is not a member;
/// 4 is a member with no relation to the guide. Evaluates to the guide id and
/// the four session cookies.
macro_rules! seeded_guide {
    ($ctx:expr, $app:expr) => {{
        for discord_id in [1, 2, 4] {
            $ctx.add_member(discord_id).await;
        }
        let author = login!($app, 1);
        let editor = login!($app, 2);
        let outsider = login!($app, 3);
        let member = login!($app, 4);

        let editor_id = $ctx.user_id(2).await;
        let outsider_id = $ctx.user_id(3).await;
        let author_id = $ctx.user_id(1).await;
        let guide_id = create_guide!(
            $app,
            author,
            guide_form("Iterators", "# Iterators", &[editor_id, outsider_id, author_id])
        );
        (guide_id, [author, editor, outsider, member])
    }};
}

#[actix_rt::test]
async fn test_only_member_editors_are_kept() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let (guide_id, _) = seeded_guide!(ctx, app);
    assert_eq!(editors_of(&ctx, guide_id).await, vec![ctx.user_id(2).await]);
}

#[actix_rt::test]
async fn test_editor_edits_but_cannot_delete() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let (guide_id, [_, editor, _, _]) = seeded_guide!(ctx, app);
    let edit_uri = format!("/guides/{}/edit", guide_id);
    let delete_uri = format!("/guides/{}/delete", guide_id);

    assert_eq!(get_status!(app, editor, &edit_uri), StatusCode::OK);
    let outsider_id = ctx.user_id(3).await;
    let member_id = ctx.user_id(4).await;
    let status = post_form!(
        app,
        editor,
        &edit_uri,
        guide_form("Iterators, revised", "# Iterators\n\nNow *lazier*.", &[outsider_id, member_id])
    );
    assert_eq!(status, StatusCode::FOUND);

    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.title, "Iterators, revised");
    assert!(guide.content_rendered.contains("<em>lazier</em>"));
    assert!(guide.edit_datetime >= guide.pub_datetime);
    assert_eq!(editors_of(&ctx, guide_id).await, vec![ctx.user_id(2).await]);

    assert_eq!(get_status!(app, editor, &delete_uri), StatusCode::FORBIDDEN);
    let req = test::TestRequest::post()
        .uri(&delete_uri)
        .cookie(editor.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(ctx.guide(guide_id).await.is_some());
}

#[actix_rt::test]
async fn test_unrelated_users_cannot_change_guide() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let (guide_id, [_, _, outsider, member]) = seeded_guide!(ctx, app);
    let edit_uri = format!("/guides/{}/edit", guide_id);
    let delete_uri = format!("/guides/{}/delete", guide_id);

    for cookie in [&outsider, &member] {
        assert_eq!(get_status!(app, cookie, &edit_uri), StatusCode::FORBIDDEN);
        let status = post_form!(app, cookie, &edit_uri, guide_form("Hijacked", "text", &[]));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(get_status!(app, cookie, &delete_uri), StatusCode::FORBIDDEN);
    }

    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.title, "Iterators");
}

#[actix_rt::test]
async fn test_author_manages_editors_and_deletes() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let (guide_id, [author, _, _, _]) = seeded_guide!(ctx, app);
    let member_id = ctx.user_id(4).await;
    let status = post_form!(
        app,
        author,
        &format!("/guides/{}/edit", guide_id),
        guide_form("Iterators", "# Iterators", &[member_id])
    );
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(editors_of(&ctx, guide_id).await, vec![member_id]);

    let req = test::TestRequest::delete()
        .uri(&format!("/guides/{}/delete", guide_id))
        .cookie(author.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(common::location(&resp), "/guides/");
    assert!(ctx.guide(guide_id).await.is_none());
    assert!(editors_of(&ctx, guide_id).await.is_empty());
}

#[actix_rt::test]
async fn test_admin_changes_any_guide() {
    let ctx = TestContext::new().await;
    let app = test_app!(ctx);

    let (guide_id, _) = seeded_guide!(ctx, app);
    ctx.add_admin(9).await;
    let admin = login!(app, 9);

    let status = post_form!(
        app,
        admin,
        &format!("/guides/{}/edit", guide_id),
        guide_form("Iterators (moderated)", "# Iterators", &[])
    );
    assert_eq!(status, StatusCode::FOUND);
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.title, "Iterators (moderated)");
    assert_eq!(guide.author_id, ctx.user_id(1).await);
    assert!(editors_of(&ctx, guide_id).await.is_empty());

    let delete_uri = format!("/guides/{}/delete", guide_id);
    assert_eq!(get_status!(app, admin, &delete_uri), StatusCode::OK);
    let status = post_form!(app, admin, &delete_uri, Vec::<(String, String)>::new());
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(ctx.guide_count().await, 0);
    assert_eq!(get_status!(app, &format!("/guides/{}", guide_id)), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_long_guide_is_accepted() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    let content = "A realistic paragraph of guide text. ".repeat(2000);
    assert!(content.len() > 64 * 1024);

    let guide_id = create_guide!(app, cookie, guide_form("Async in depth", &content, &[]));
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.content_raw, content);

    let edited = format!("{}\n\nOne more paragraph.", content);
    let status = post_form!(
        app,
        cookie,
        &format!("/guides/{}/edit", guide_id),
        guide_form("Async in depth", &edited, &[])
    );
    assert_eq!(status, StatusCode::FOUND);
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert!(guide.content_rendered.contains("One more paragraph."));
}

#[actix_rt::test]
async fn test_delete_lowers_author_count() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    ctx.add_member(2).await;
    let app = test_app!(ctx);

    let author = login!(app, 1);
    let other = login!(app, 2);
    let first = create_guide!(app, author, guide_form("Slices", "text", &[]));
    let second = create_guide!(app, author, guide_form("Vectors", "text", &[]));
    let others = create_guide!(app, other, guide_form("Strings", "text", &[]));

    let author_id = ctx.user_id(1).await;
    let other_id = ctx.user_id(2).await;
    let db = ctx.db.get_ref();
    assert_eq!(count_by_author(db, author_id).await.expect("count"), 2);
    assert_eq!(count_by_author(db, other_id).await.expect("count"), 1);

    let status = post_form!(
        app,
        author,
        &format!("/guides/{}/delete", first),
        Vec::<(String, String)>::new()
    );
    assert_eq!(status, StatusCode::FOUND);

    assert_eq!(count_by_author(db, author_id).await.expect("count"), 1);
    assert_eq!(count_by_author(db, other_id).await.expect("count"), 1);
    assert_eq!(get_status!(app, &format!("/guides/{}", first)), StatusCode::NOT_FOUND);
    assert_eq!(get_status!(app, &format!("/guides/{}", second)), StatusCode::OK);
    assert_eq!(get_status!(app, &format!("/guides/{}", others)), StatusCode::OK);
}

#[actix_rt::test]
async fn test_unreachable_webhook_does_not_fail_writes() {
    let ctx = TestContext::with_webhook(Some("http://127.0.0.1:1/api/webhooks/1/token")).await;
    assert!(ctx.webhook.is_enabled());
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    let guide_id = create_guide!(app, cookie, guide_form("Pinning", "text", &[]));
    assert!(ctx.guide(guide_id).await.is_some());

    let status = post_form!(
        app,
        cookie,
        &format!("/guides/{}/edit", guide_id),
        guide_form("Pinning, revised", "text", &[])
    );
    assert_eq!(status, StatusCode::FOUND);
    let guide = ctx.guide(guide_id).await.expect("stored guide");
    assert_eq!(guide.title, "Pinning, revised");

    let status = post_form!(
        app,
        cookie,
        &format!("/guides/{}/delete", guide_id),
        Vec::<(String, String)>::new()
    );
    assert_eq!(status, StatusCode::FOUND);
    assert!(ctx.guide(guide_id).await.is_none());
}

#[actix_rt::test]
async fn test_feeds_list_latest_guides() {
    let ctx = TestContext::new().await;
    ctx.add_member(1).await;
    let app = test_app!(ctx);

    let cookie = login!(app, 1);
    for n in 1..=6 {
        create_guide!(app, cookie, guide_form(&format!("Guide number {}", n), "text", &[]));
    }

    let req = test::TestRequest::get().uri("/guides/feed/rss").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
    let body = common::text(test::read_body(resp).await);
    assert!(content_type
        .and_then(|value| value.to_str().ok().map(str::to_owned))
        .unwrap_or_default()
        .starts_with("application/rss+xml"));
    assert!(body.contains("Latest Programming Guides"));
    assert_eq!(body.matches("<item>").count(), 5);
    assert!(body.contains("Guide number 6"));
    assert!(body.contains("Guide number 2"));
    assert!(!body.contains("Guide number 1<"));
    assert!(body.contains("<link>http:"), "absolute links: {}", body);

    let req = test::TestRequest::get().uri("/guides/feed/atom").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = common::text(test::read_body(resp).await);
    assert_eq!(body.matches("<entry>").count(), 5);
    assert!(body.contains("Guide number 6"));
    assert!(body.contains("Latest Programming Guides"));
}
