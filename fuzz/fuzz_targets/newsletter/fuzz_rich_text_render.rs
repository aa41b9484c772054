// Run with: cargo fuzz run fuzz_rich_text_render
// Any stored body must render without panicking and without leaking raw markup
#![no_main]

use arbitrary::Arbitrary;
use bulletin::template::{RichBody, TemplateRenderer};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    title: &'a str,
    body: &'a str,
    email: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(renderer) = TemplateRenderer::new("https://bulletin.example.com") else {
        return;
    };
    let body = RichBody::parse(input.body);
    let rendered = renderer
        .render(input.title, &body, &[], input.email)
        .expect("Rendering a parsed body never fails");

    assert!(!rendered.html.contains("<script"));
});
