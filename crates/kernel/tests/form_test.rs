#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Form protection tests: rendering, submission and verification together.

use formseal_kernel::GuardConfig;
use formseal_kernel::form::{
    FieldOptions, FieldTokenGuard, Form, FormBuilder, FormElement, Rejection, SubmittedData,
    TokenContext, Verification,
};
use formseal_kernel::theme::{TemplateRenderer, form_templates};
use formseal_test_utils::{TEST_SALT, TEST_SESSION, TestSubmission};

const URL: &str = "/articles/add";

fn builder() -> FormBuilder {
    FormBuilder::new(
        TemplateRenderer::new(form_templates()),
        GuardConfig::new(TEST_SALT),
    )
}

fn article_form() -> Form {
    Form::new("article")
        .action(URL)
        .element("Article.title", FormElement::textfield().title("Title"))
        .element("Article.body", FormElement::textarea(5).weight(1))
        .element(
            "Article.tags",
            FormElement::checkboxes(vec![
                ("a".to_string(), "A".to_string()),
                ("b".to_string(), "B".to_string()),
            ])
            .weight(2),
        )
        .element("Article.notes", FormElement::textarea(2).unlocked().weight(3))
        .element("Article.status", FormElement::hidden("draft"))
        .element("save", FormElement::submit("Save").named().weight(10))
}

fn render(form: &Form, debug: bool) -> String {
    builder()
        .render(form, &TokenContext::new(URL, TEST_SESSION).debug(debug))
        .unwrap()
        .html
}

/// Posts the submission through form encoding, as a browser would.
fn submitted(submission: &TestSubmission) -> SubmittedData {
    SubmittedData::from_urlencoded(&submission.to_body())
}

fn verify(submission: &TestSubmission) -> Verification {
    FieldTokenGuard::new(GuardConfig::new(TEST_SALT)).verify_detailed(
        &submitted(submission),
        URL,
        TEST_SESSION,
    )
}

fn filled(html: &str) -> TestSubmission {
    TestSubmission::from_html(html)
        .field("Article[title]", "Hello")
        .field("Article[body]", "World")
        .field("Article[tags][]", "a")
        .field("save", "Save")
}

#[test]
fn test_article_scenario() {
    let mut guard = FieldTokenGuard::new(GuardConfig::new(TEST_SALT));
    guard
        .register_field("Article.title", FieldOptions::locked())
        .unwrap();
    guard
        .register_field("Article.body", FieldOptions::locked())
        .unwrap();
    let token = guard
        .build_digest(&TokenContext::new(URL, "abc"), &[])
        .unwrap();

    let mut data: SubmittedData = [("Article.title", "T"), ("Article.body", "B")]
        .into_iter()
        .collect();
    for (name, value) in token.hidden_fields() {
        data.push(name, value);
    }
    assert!(guard.verify(&data, URL, "abc"));

    data.remove("Article.body");
    assert!(!guard.verify(&data, URL, "abc"));
}

#[test]
fn test_rendered_form_round_trip() {
    let html = render(&article_form(), false);
    assert_eq!(verify(&filled(&html)), Verification::Valid);
}

#[test]
fn test_tampered_hidden_value_is_rejected() {
    let html = render(&article_form(), false);
    let submission = filled(&html).replace("Article[status]", "published");
    assert!(!verify(&submission).is_valid());
}

#[test]
fn test_removed_hidden_field_is_rejected() {
    let html = render(&article_form(), false);
    let submission = filled(&html).without("Article[status]");
    assert!(!verify(&submission).is_valid());
}

#[test]
fn test_unlocked_field_may_be_added() {
    let html = render(&article_form(), false);
    let submission = filled(&html).field("Article[notes]", "anything at all");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_unexpected_field_is_rejected() {
    let html = render(&article_form(), false);
    let submission = filled(&html).field("Article[admin]", "1");
    assert!(!verify(&submission).is_valid());
}

#[test]
fn test_no_checkbox_selected_still_round_trips() {
    let html = render(&article_form(), false);
    let submission = TestSubmission::from_html(&html)
        .field("Article[title]", "Hello")
        .field("Article[body]", "World");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_stripped_token_is_rejected() {
    let html = render(&article_form(), false);
    let submission = filled(&html).without("_Token[fields]");
    assert_eq!(
        verify(&submission),
        Verification::Rejected(vec![Rejection::MissingToken])
    );

    let submission = filled(&html).without("_Token[unlocked]");
    assert_eq!(
        verify(&submission),
        Verification::Rejected(vec![Rejection::MissingUnlocked])
    );
}

#[test]
fn test_debug_payload_explains_tampering() {
    let html = render(&article_form(), true);
    assert!(html.contains("_Token[debug]"));

    let submission = filled(&html).replace("Article[status]", "published");
    let Verification::Rejected(reasons) = verify(&submission) else {
        panic!("tampered submission accepted");
    };
    assert_eq!(
        reasons,
        vec![Rejection::TamperedValue("Article.status".to_string())]
    );
}

#[test]
fn test_debug_flag_read_at_build_time() {
    let mut guard = FieldTokenGuard::new(GuardConfig::new(TEST_SALT));
    let ctx = TokenContext::new(URL, TEST_SESSION);
    guard
        .register_field("Article.title", FieldOptions::locked())
        .unwrap();

    assert!(guard.build_digest(&ctx, &[]).unwrap().debug.is_none());
    let ctx = ctx.debug(true);
    assert!(guard.build_digest(&ctx, &[]).unwrap().debug.is_some());
}

#[test]
fn test_image_submit_coordinates_are_unlocked() {
    let form = Form::new("search")
        .action(URL)
        .element("q", FormElement::textfield())
        .element("go", FormElement::image_submit("/go.png"));
    let html = render(&form, false);
    let submission = TestSubmission::from_html(&html)
        .field("q", "rust")
        .field("x", "12")
        .field("y", "7");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_named_image_submit_coordinates_are_unlocked() {
    let form = Form::new("search")
        .action(URL)
        .element("Article.q", FormElement::textfield())
        .element("Article.go", FormElement::image_submit("/go.png").named());
    let html = render(&form, false);
    assert!(html.contains("name=\"Article[go]\""));

    let submission = TestSubmission::from_html(&html)
        .field("Article[q]", "rust")
        .field("Article[go].x", "3")
        .field("Article[go].y", "4");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_duplicated_hidden_field_is_rejected() {
    let html = render(&article_form(), false);
    for name in ["Article[status]", "Article[status][]"] {
        let submission = filled(&html).field(name, "published");
        assert_eq!(
            verify(&submission),
            Verification::Rejected(vec![Rejection::TamperedValue(
                "Article.status".to_string()
            )]),
            "{name} accepted"
        );
    }
}

#[test]
fn test_indexed_hidden_fields_round_trip() {
    let form = Form::new("order")
        .action(URL)
        .element("Items.0", FormElement::hidden("a"))
        .element("Items.1", FormElement::hidden("b"));
    let html = render(&form, false);

    let submission = TestSubmission::from_html(&html);
    assert_eq!(verify(&submission), Verification::Valid);

    let submission = TestSubmission::from_html(&html).replace("Items[1]", "c");
    assert!(!verify(&submission).is_valid());
}

#[test]
fn test_multi_select_round_trips() {
    let form = Form::new("f")
        .action(URL)
        .element("Empty", FormElement::multi_select(vec![]))
        .element(
            "Tags",
            FormElement::multi_select(vec![]).empty_option("(none)"),
        );
    let html = render(&form, false);

    // Only the placeholder-bearing select posts its companion input.
    let submission = TestSubmission::from_html(&html);
    assert_eq!(submission.pairs().iter().filter(|(n, _)| n == "Tags").count(), 1);
    assert!(submission.pairs().iter().all(|(n, _)| n != "Empty"));
    assert_eq!(verify(&submission), Verification::Valid);

    let submission = TestSubmission::from_html(&html).field("Tags[]", "");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_disabled_field_is_not_required() {
    let form = Form::new("f")
        .action(URL)
        .element("Article.title", FormElement::textfield())
        .element("Article.slug", FormElement::textfield().disabled());
    let html = render(&form, false);
    let submission = TestSubmission::from_html(&html).field("Article[title]", "t");
    assert_eq!(verify(&submission), Verification::Valid);
}

#[test]
fn test_unlocked_insertion_order_is_irrelevant() {
    let ctx = TokenContext::new(URL, TEST_SESSION);
    let names = ["c", "a", "b"];
    let mut digests = Vec::new();
    for rotation in 0..names.len() {
        let mut guard = FieldTokenGuard::new(GuardConfig::new(TEST_SALT));
        guard
            .register_field("Article.title", FieldOptions::locked())
            .unwrap();
        for i in 0..names.len() {
            guard
                .unlock_field(names[(rotation + i) % names.len()])
                .unwrap();
        }
        digests.push(guard.build_digest(&ctx, &[]).unwrap().digest);
    }
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_other_session_is_rejected() {
    let html = render(&article_form(), false);
    let data = submitted(&filled(&html));
    let guard = FieldTokenGuard::new(GuardConfig::new(TEST_SALT));
    assert!(guard.verify(&data, URL, TEST_SESSION));
    assert!(!guard.verify(&data, URL, "someone-else"));
    assert!(!guard.verify(&data, "/articles/edit", TEST_SESSION));
}
