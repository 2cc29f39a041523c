use annotator::renderer::SpanPainter;
use annotator::{AnnotatorConfig, HostDriver, TextAnnotator};
use anyhow::Context;
use bus::Scheduler;
use html::Document;
use layout::{FixedWidthMeasurer, Page};
use mimalloc::MiMalloc;
use std::cell::RefCell;
use std::rc::Rc;
use store::User;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const SAMPLE: &str = r#"<div id="content"><h1>Fables</h1><p>The quick brown fox jumps over the lazy dog.</p><p>Slow and steady <span class="not-annotatable">[editor's note]</span> wins the race.</p></div>"#;

struct Args {
    config: Option<String>,
    html: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        html: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?),
            "--html" => args.html = Some(it.next().context("--html needs a path")?),
            "--help" | "-h" => {
                println!("usage: marginalia [--config annotator.toml] [--html page.html]");
                println!("The page must contain an element with id=\"content\".");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            AnnotatorConfig::from_toml_str(&text)?
        }
        None => AnnotatorConfig::default(),
    };
    let markup = match &args.html {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => SAMPLE.to_string(),
    };

    let doc = Document::from_html(&markup);
    let container = doc
        .get_element_by_id("content")
        .context("no element with id=\"content\"")?;
    let page = Rc::new(RefCell::new(Page::new(
        doc,
        FixedWidthMeasurer::default(),
        640.0,
        480.0,
    )));
    let annotator = TextAnnotator::new(Rc::clone(&page), container, Scheduler::new(), config);
    annotator.set_user(User::new("demo").with_name("Demo User"));
    let _redraws = annotator.on_redraw(|info| {
        log::info!("painted {} highlights", info.ids.len());
    });

    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    // second line: "The quick brown fox ..."; 8px chars, 16px lines
    driver.select((4.0 * 8.0, 24.0), (19.0 * 8.0, 24.0));
    // third line, across the not-annotatable note
    driver.select((5.0 * 8.0, 40.0), (45.0 * 8.0, 40.0));
    driver.settle();

    // a click on the first annotation selects it
    driver.click(6.0 * 8.0, 24.0);
    driver.settle();
    log::info!("selected: {:?}", annotator.state().selection().ids());

    // live ranges are not serialised; this is the form a backend would store
    println!(
        "{}",
        serde_json::to_string_pretty(&annotator.get_annotations())?
    );

    annotator.renderer().with_painter(|p| {
        if let Some(spans) = p.as_any().downcast_ref::<SpanPainter>() {
            for id in spans.painted_ids() {
                log::info!("{id}: {} span(s)", spans.spans_for(id).len());
            }
        }
    });

    annotator.destroy();
    Ok(())
}
