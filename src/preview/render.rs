//! Markdown and HTML rendering of previews

use pulldown_cmark::{html, Event, Options, Parser};

use super::{AudienceView, Preview, StepView};
use crate::core::document::{BeneficiaryType, Lang};

/// Fixed interface strings for one language
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub overview: &'static str,
    pub steps: &'static str,
    pub shared_steps: &'static str,
    pub step: &'static str,
    pub no_steps: &'static str,
    pub untitled: &'static str,
    pub untitled_manual: &'static str,
    pub image_pending: &'static str,
    pub select_beneficiary: &'static str,
}

impl Labels {
    pub fn for_lang(lang: Lang) -> Self {
        match lang {
            Lang::Ar => Self {
                overview: "نظرة عامة",
                steps: "الخطوات",
                shared_steps: "الخطوات المشتركة",
                step: "خطوة",
                no_steps: "لا توجد خطوات بعد",
                untitled: "بدون عنوان",
                untitled_manual: "دليل بدون عنوان",
                image_pending: "الصورة قيد الرفع",
                select_beneficiary: "الرجاء تحديد نوع مستفيد واحد على الأقل لمعاينة الدليل",
            },
            Lang::En => Self {
                overview: "Overview",
                steps: "Steps",
                shared_steps: "Shared Steps",
                step: "Step",
                no_steps: "No steps yet",
                untitled: "Untitled",
                untitled_manual: "Untitled Manual",
                image_pending: "Image pending upload",
                select_beneficiary:
                    "Please select at least one beneficiary type to preview the manual",
            },
        }
    }

    /// Tab label for a beneficiary type
    pub fn beneficiary(lang: Lang, beneficiary: BeneficiaryType) -> &'static str {
        match (lang, beneficiary) {
            (Lang::Ar, BeneficiaryType::Individual) => "فرد",
            (Lang::Ar, BeneficiaryType::Business) => "منشأة",
            (Lang::Ar, BeneficiaryType::GovernmentEntity) => "جهة حكومية",
            (Lang::En, BeneficiaryType::Individual) => "Individual",
            (Lang::En, BeneficiaryType::Business) => "Business",
            (Lang::En, BeneficiaryType::GovernmentEntity) => "Government Entity",
        }
    }
}

fn or_fallback(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        escape(text.trim())
    }
}

/// Backslash-escape author text so it renders literally
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_punctuation() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Percent-encode the characters that would end a Markdown link destination
fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.trim().chars() {
        match c {
            ' ' => out.push_str("%20"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\\' => out.push_str("%5C"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Render one audience view as Markdown
pub fn markdown(view: &AudienceView) -> String {
    let labels = Labels::for_lang(view.lang);
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", or_fallback(&view.title, labels.untitled_manual)));
    out.push_str(&format!("## {}\n\n", labels.overview));
    if !view.overview.trim().is_empty() {
        out.push_str(&escape(view.overview.trim()));
        out.push_str("\n\n");
    }

    out.push_str(&format!("## {}\n\n", labels.steps));
    if view.is_empty() {
        out.push_str(&format!("_{}_\n", labels.no_steps));
        return out;
    }

    if !view.shared.is_empty() {
        out.push_str(&format!("### {}\n\n", labels.shared_steps));
        for step in &view.shared {
            push_step(&mut out, step, &labels);
        }
    }
    if !view.specific.is_empty() {
        out.push_str(&format!(
            "### {}\n\n",
            Labels::beneficiary(view.lang, view.beneficiary)
        ));
        for step in &view.specific {
            push_step(&mut out, step, &labels);
        }
    }
    out
}

fn push_step(out: &mut String, step: &StepView, labels: &Labels) {
    out.push_str(&format!(
        "#### {} {}: {}\n\n",
        labels.step,
        step.number,
        or_fallback(&step.title, labels.untitled)
    ));
    if !step.body.trim().is_empty() {
        out.push_str(&escape(step.body.trim()));
        out.push_str("\n\n");
    }
    for image in &step.images {
        match &image.url {
            Some(url) => out.push_str(&format!(
                "![{}]({})\n\n",
                escape(image.caption.trim()),
                escape_url(url)
            )),
            None => out.push_str(&format!("_{}_\n\n", labels.image_pending)),
        }
        if !image.caption.trim().is_empty() {
            out.push_str(&format!("_{}_\n\n", escape(image.caption.trim())));
        }
    }
}

/// Render one audience view as an HTML fragment
pub fn html(view: &AudienceView) -> String {
    wrap(view.lang, &markdown_to_html(&markdown(view)))
}

/// Render a whole preview as Markdown, one section per tab
pub fn preview_markdown(preview: &Preview) -> String {
    match preview {
        Preview::NothingToPreview { lang } => {
            format!("_{}_\n", Labels::for_lang(*lang).select_beneficiary)
        }
        Preview::Single(view) => markdown(view),
        Preview::Tabs(views) => views
            .iter()
            .map(|view| {
                format!(
                    "<!-- {} -->\n\n{}",
                    Labels::beneficiary(view.lang, view.beneficiary),
                    markdown(view)
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n\n"),
    }
}

/// Render a whole preview as HTML, one `section` per tab
pub fn preview_html(preview: &Preview) -> String {
    match preview {
        Preview::NothingToPreview { lang } => wrap(
            *lang,
            &format!("<p>{}</p>\n", Labels::for_lang(*lang).select_beneficiary),
        ),
        Preview::Single(view) => html(view),
        Preview::Tabs(views) => views
            .iter()
            .map(|view| {
                format!(
                    "<section data-beneficiary=\"{:?}\">\n{}</section>\n",
                    view.beneficiary,
                    html(view)
                )
            })
            .collect(),
    }
}

fn markdown_to_html(markdown: &str) -> String {
    // Raw HTML is shown as text, never passed through.
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn wrap(lang: Lang, body: &str) -> String {
    let code = match lang {
        Lang::Ar => "ar",
        Lang::En => "en",
    };
    format!("<div lang=\"{}\" dir=\"{}\">\n{}</div>\n", code, lang.dir(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::ImageView;

    fn view(lang: Lang) -> AudienceView {
        AudienceView {
            beneficiary: BeneficiaryType::Business,
            lang,
            title: "Commercial licence".into(),
            overview: "Apply online.".into(),
            shared: vec![StepView {
                step_id: "s1".into(),
                number: 1,
                title: "Sign in".into(),
                body: "Use your national id.".into(),
                images: vec![ImageView {
                    image_id: "i1".into(),
                    url: Some("https://cdn.example/login.png".into()),
                    caption: "Login page".into(),
                }],
            }],
            specific: vec![StepView {
                step_id: "b1".into(),
                number: 1,
                title: String::new(),
                body: String::new(),
                images: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_markdown_orders_sections_and_falls_back() {
        let md = markdown(&view(Lang::En));
        let shared = md.find("### Shared Steps").unwrap();
        let business = md.find("### Business").unwrap();
        assert!(shared < business);
        assert!(md.contains("#### Step 1: Sign in"));
        assert!(md.contains("#### Step 1: Untitled"));
        assert!(md.contains("![Login page](https://cdn.example/login.png)"));
    }

    #[test]
    fn test_empty_view_says_no_steps() {
        let mut empty = view(Lang::Ar);
        empty.shared.clear();
        empty.specific.clear();
        empty.title.clear();
        let md = markdown(&empty);
        assert!(md.starts_with("# دليل بدون عنوان"));
        assert!(md.contains("لا توجد خطوات بعد"));
    }

    #[test]
    fn test_html_sets_direction() {
        let out = html(&view(Lang::Ar));
        assert!(out.starts_with("<div lang=\"ar\" dir=\"rtl\">"));
        assert!(out.contains("<h1>Commercial licence</h1>"));

        let placeholder = preview_html(&Preview::NothingToPreview { lang: Lang::En });
        assert!(placeholder.contains("Please select at least one beneficiary type"));
    }

    #[test]
    fn test_tabs_render_one_section_each() {
        let mut second = view(Lang::En);
        second.beneficiary = BeneficiaryType::Individual;
        let out = preview_html(&Preview::Tabs(vec![view(Lang::En), second]));
        assert_eq!(out.matches("<section").count(), 2);
        assert!(out.contains("data-beneficiary=\"Individual\""));
    }

    #[test]
    fn test_author_text_cannot_inject_markup() {
        let mut hostile = view(Lang::En);
        hostile.title = "<b>Licence</b>".into();
        hostile.shared[0].body = "<script>alert(1)</script>\n\n# Injected heading".into();
        hostile.shared[0].images[0].caption = "shot](javascript:alert(1)".into();

        let out = html(&hostile);
        assert!(!out.contains("<script>"));
        assert!(!out.contains("<b>"));
        assert!(!out.contains("<h1>Injected heading</h1>"));
        assert!(!out.contains("href=\"javascript"));
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(out.contains("# Injected heading"));
        assert!(out.contains("src=\"https://cdn.example/login.png\""));
    }

    #[test]
    fn test_markdown_escapes_block_markers() {
        let mut listy = view(Lang::En);
        listy.overview = "- not a list\n1. not numbered".into();
        let md = markdown(&listy);
        assert!(md.contains("\\- not a list\n1\\. not numbered"));
    }
}
