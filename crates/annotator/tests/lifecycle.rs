use anchoring::TextSelector;
use annotator::renderer::{CanvasPainter, HOVERED_CLASS, HighlightsPainter, SpanPainter};
use annotator::{AnnotatorConfig, Filter, HighlightStyle, HostDriver, RendererKind, TextAnnotator};
use bus::Scheduler;
use core_types::{Bounds, Rect};
use html::Document;
use layout::{FixedWidthMeasurer, Page};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use store::{Annotation, AnnotationTarget, Origin, UserSelectAction};

const FOX: &str = r#"<div id="c"><p id="p">The quick brown fox</p></div>"#;

fn setup_with(markup: &str, width: f32, height: f32, config: AnnotatorConfig) -> TextAnnotator {
    let doc = Document::from_html(markup);
    let c = doc.get_element_by_id("c").unwrap();
    let page = Rc::new(RefCell::new(Page::new(
        doc,
        FixedWidthMeasurer::default(),
        width,
        height,
    )));
    TextAnnotator::new(page, c, Scheduler::new(), config)
}

fn setup(markup: &str) -> TextAnnotator {
    setup_with(markup, 800.0, 600.0, AnnotatorConfig::default())
}

fn text_annotation(id: &str, exact: &str, start: usize, end: usize) -> Annotation {
    Annotation::from_target(AnnotationTarget::new(
        id,
        vec![TextSelector::new(exact, start, end).into()],
    ))
}

fn count_redraws(annotator: &TextAnnotator) -> (Rc<Cell<usize>>, bus::Subscription) {
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    let sub = annotator.on_redraw(move |_| c.set(c.get() + 1));
    (count, sub)
}

#[test]
fn fifty_mutations_cost_one_recalculation_and_one_redraw() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    let (redraws, _redraw_sub) = count_redraws(&annotator);
    let recalcs = Rc::new(Cell::new(0));
    let r = Rc::clone(&recalcs);
    let _recalc_sub = annotator.on_recalculate_positions(move || r.set(r.get() + 1));

    let p = annotator.page().borrow().document().get_element_by_id("p").unwrap();
    for i in 0..50 {
        driver
            .mutate(|doc| doc.set_attribute(p, "data-n", &i.to_string()))
            .unwrap();
        driver.advance(1);
    }
    assert!(driver.settle());
    assert_eq!(recalcs.get(), 1);
    assert_eq!(redraws.get(), 1);
}

#[test]
fn fifty_store_writes_cost_one_redraw() {
    let annotator = setup(FOX);
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    let (redraws, _sub) = count_redraws(&annotator);
    for i in 0..50 {
        assert!(annotator.add_annotation(text_annotation(&format!("q{i}"), "quick", 4, 9)));
    }
    assert!(driver.settle());
    assert_eq!(redraws.get(), 1);
    assert_eq!(annotator.state().indexed_len(), 50);
}

#[test]
fn editing_text_moves_the_highlight_with_its_quote() {
    let config = AnnotatorConfig {
        quote_fallback: true,
        ..Default::default()
    };
    let annotator = setup_with(FOX, 800.0, 600.0, config);
    assert!(annotator.add_annotation(text_annotation("b", "brown", 10, 15)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();
    assert_eq!(annotator.get_annotation_bounds("b").unwrap().min_x, 80.0);

    driver
        .mutate(|doc| {
            let p = doc.get_element_by_id("p").unwrap();
            let t = doc.children(p)[0];
            doc.set_text(t, "A quick brown fox")
        })
        .unwrap();
    assert!(driver.settle());

    let stored = annotator.get_annotation("b").unwrap();
    let selector = stored.target.selector[0].text();
    assert_eq!((selector.start, selector.end), (8, 13));
    let live = selector.range.unwrap().text(annotator.page().borrow().document());
    assert_eq!(live, "brown");
    assert_eq!(
        annotator.get_annotation_rects("b"),
        Some(vec![Rect::new(64.0, 0.0, 40.0, 16.0)])
    );
}

#[test]
fn painter_writes_do_not_trigger_recalculation() {
    let annotator = setup(FOX);
    let recalcs = Rc::new(Cell::new(0));
    let r = Rc::clone(&recalcs);
    let _sub = annotator.on_recalculate_positions(move || r.set(r.get() + 1));
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();
    driver.move_to(40.0, 8.0);
    driver.settle();
    annotator.flush_mutations();
    driver.settle();
    assert_eq!(recalcs.get(), 0);
}

#[test]
fn index_follows_the_layout_after_resize() {
    let annotator = setup(FOX);
    let added = annotator.bulk_add_annotations(
        vec![
            text_annotation("quick", "quick", 4, 9),
            text_annotation("brown", "brown", 10, 15),
            text_annotation("fox", "fox", 16, 19),
        ],
        false,
        Origin::Remote,
    );
    assert!(added.is_empty());
    let mut driver = HostDriver::new(&annotator);
    driver.settle();
    assert_eq!(annotator.get_annotation_bounds("fox").unwrap().min_y, 0.0);

    // 10 chars per line: "brown fox" wraps onto the second line
    driver.resize(80.0, 600.0);
    driver.settle();
    assert_eq!(annotator.get_annotation_bounds("fox").unwrap().min_y, 16.0);
    assert_eq!(annotator.get_annotation_bounds("brown").unwrap().min_x, 0.0);

    let mut indexed = annotator.state().indexed_ids();
    indexed.sort();
    let mut stored: Vec<String> = annotator.get_annotations().into_iter().map(|a| a.id).collect();
    stored.sort();
    assert_eq!(indexed, stored);
}

#[test]
fn recalculating_twice_changes_nothing() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let stored = annotator.get_annotation("q").unwrap();
    let rects = annotator.get_annotation_rects("q");

    annotator.recalculate_positions();
    annotator.recalculate_positions();
    assert_eq!(annotator.get_annotation_rects("q"), rects);

    // re-submitting an already revived target keeps its anchor
    annotator.update_target(stored.target.clone()).unwrap();
    let again = annotator.get_annotation("q").unwrap();
    assert!(again.target.selector[0].same_anchor(&stored.target.selector[0]));
    assert_eq!(again.target.selector[0].range(), stored.target.selector[0].range());
}

#[test]
fn smallest_annotation_wins_the_point() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("wide", "quick brown", 4, 15)));
    assert!(annotator.add_annotation(text_annotation("narrow", "brown", 10, 15)));
    assert!(annotator.add_annotation(text_annotation("b-twin", "brown", 10, 15)));

    // same area: ties break on id
    let top = annotator.get_at(88.0, 8.0, false);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, "b-twin");

    let ids: Vec<String> = annotator.get_at(88.0, 8.0, true).into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["b-twin", "narrow", "wide"]);

    let skip_twin: Filter = Rc::new(|a: &Annotation| a.id != "b-twin");
    annotator.set_filter(Some(skip_twin));
    assert_eq!(annotator.get_at(88.0, 8.0, false)[0].id, "narrow");
}

#[test]
fn unanchorable_annotations_are_rejected() {
    let annotator = setup(FOX);
    assert!(!annotator.add_annotation(text_annotation("x", "missing", 40, 47)));
    assert!(annotator.get_annotation("x").is_none());
    assert_eq!(annotator.state().indexed_len(), 0);
}

#[test]
fn scroll_into_view_centres_the_annotation() {
    let mut markup = String::from(r#"<div id="c">"#);
    for _ in 0..40 {
        markup.push_str("<p>filler</p>");
    }
    markup.push_str("<p>target</p>");
    for _ in 0..9 {
        markup.push_str("<p>filler</p>");
    }
    markup.push_str("</div>");
    let annotator = setup_with(&markup, 800.0, 100.0, AnnotatorConfig::default());
    assert!(annotator.add_annotation(text_annotation("t", "target", 240, 246)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    let painted = Rc::new(RefCell::new(Vec::new()));
    let p = Rc::clone(&painted);
    let _sub = annotator.on_redraw(move |info| *p.borrow_mut() = info.ids.clone());

    assert!(!annotator.scroll_into_view("nope", None));
    assert!(annotator.scroll_into_view("t", None));
    // the target spans y 640..656; centring it in a 100px viewport
    assert_eq!(annotator.page().borrow().viewport().scroll_y, 598.0);

    driver.settle();
    assert_eq!(*painted.borrow(), vec!["t".to_string()]);

    let visible = Bounds::new(0.0, 598.0, 800.0, 698.0);
    assert_eq!(annotator.get_intersecting(&visible).len(), 1);
}

#[test]
fn lazy_load_waits_for_text() {
    let markup = r#"<div id="c"><p id="p">The quick</p></div>"#;
    let annotator = setup(markup);
    let task = annotator.load_lazily(vec![
        text_annotation("now", "quick", 4, 9),
        text_annotation("later", "fox", 16, 19),
    ]);
    assert!(annotator.get_annotation("now").is_some());
    assert_eq!(task.remaining(), 1);

    let p = annotator.page().borrow().document().get_element_by_id("p").unwrap();
    let mut driver = HostDriver::new(&annotator);
    driver
        .mutate(|doc| doc.set_text_content(p, "The quick brown fox"))
        .unwrap();
    driver.advance(annotator.config().lazy_retry_delay_ms);
    assert!(task.is_done());
    assert!(annotator.get_annotation("later").is_some());
    driver.settle();
    assert!(annotator.get_annotation_bounds("later").is_some());
}

#[test]
fn destroy_cancels_pending_work_and_removes_the_layer() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let task = annotator.load_lazily(vec![text_annotation("x", "missing", 40, 47)]);
    let p = annotator.page().borrow().document().get_element_by_id("p").unwrap();
    annotator
        .mutate_dom(|doc| doc.set_attribute(p, "data-x", "1"))
        .unwrap();
    let layer = annotator
        .renderer()
        .with_painter(|painter| painter.layer())
        .unwrap();
    assert!(!annotator.scheduler().is_idle());

    let (redraws, _sub) = count_redraws(&annotator);
    annotator.destroy();
    assert!(annotator.is_destroyed());
    assert!(annotator.scheduler().is_idle());
    assert!(task.is_done());
    assert!(!annotator.page().borrow().document().is_connected(layer));

    let mut driver = HostDriver::new(&annotator);
    driver.select((32.0, 8.0), (72.0, 8.0));
    driver.settle();
    assert_eq!(redraws.get(), 0);
    assert_eq!(annotator.get_annotations().len(), 1);
}

#[test]
fn highlights_renderer_registers_named_groups() {
    let config = AnnotatorConfig {
        renderer: RendererKind::Highlights,
        ..AnnotatorConfig::default()
    };
    let annotator = setup_with(FOX, 800.0, 600.0, config);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    assert!(annotator.add_annotation(text_annotation("f", "fox", 16, 19)));
    annotator.set_selected(&["f".to_string(), "ghost".to_string()], false);
    assert_eq!(annotator.state().selection().ids(), vec!["f".to_string()]);
    HostDriver::new(&annotator).settle();

    let groups = annotator.renderer().with_painter(|p| {
        p.as_any()
            .downcast_ref::<HighlightsPainter>()
            .map(|h| h.registry().len())
    });
    assert_eq!(groups, Some(2));
    // no layer element was added to the container
    let c = annotator.container();
    let children = annotator.page().borrow().document().children(c).len();
    assert_eq!(children, 1);
}

#[test]
fn canvas_renderer_follows_scrolling() {
    let config = AnnotatorConfig {
        renderer: RendererKind::Canvas,
        ..AnnotatorConfig::default()
    };
    let mut markup = String::from(r#"<div id="c"><p>The quick brown fox</p>"#);
    for _ in 0..20 {
        markup.push_str("<p>filler</p>");
    }
    markup.push_str("</div>");
    let annotator = setup_with(&markup, 800.0, 100.0, config);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();
    let shapes = |a: &TextAnnotator| {
        a.renderer().with_painter(|p| {
            p.as_any()
                .downcast_ref::<CanvasPainter>()
                .map(|c| c.shapes().len())
        })
    };
    assert_eq!(shapes(&annotator), Some(1));

    driver.scroll_to(0.0, 200.0);
    driver.settle();
    assert_eq!(shapes(&annotator), Some(0));
}

#[test]
fn per_annotation_style_and_visibility() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("q", "quick", 4, 9)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    annotator.set_style(Some(HighlightStyle::selected().into()), Some("q"));
    driver.settle();
    let style = annotator.renderer().with_painter(|p| {
        let spans = p.as_any().downcast_ref::<SpanPainter>()?;
        let span = *spans.spans_for("q").first()?;
        annotator
            .page()
            .borrow()
            .document()
            .attribute(span, "style")
            .map(str::to_string)
    });
    assert!(style.unwrap().contains("0.45"));

    annotator.set_visible(false);
    let layer = annotator.renderer().with_painter(|p| p.layer()).unwrap();
    let layer_style = annotator
        .page()
        .borrow()
        .document()
        .attribute(layer, "style")
        .map(str::to_string);
    assert!(layer_style.unwrap().contains("display:none"));
}

fn container_hovered(annotator: &TextAnnotator) -> bool {
    annotator
        .page()
        .borrow()
        .document()
        .has_class(annotator.container(), HOVERED_CLASS)
}

#[test]
fn pointer_moves_track_hover() {
    let annotator = setup(FOX);
    assert!(annotator.add_annotation(text_annotation("b", "brown", 10, 15)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    driver.move_to(96.0, 8.0);
    assert_eq!(annotator.state().hover().current(), Some("b".to_string()));
    assert!(container_hovered(&annotator));

    driver.move_to(8.0, 8.0);
    assert_eq!(annotator.state().hover().current(), None);
    assert!(!container_hovered(&annotator));
}

#[test]
fn no_hover_when_annotations_are_not_selectable() {
    let config = AnnotatorConfig {
        user_select_action: UserSelectAction::None,
        ..Default::default()
    };
    let annotator = setup_with(FOX, 800.0, 600.0, config);
    assert!(annotator.add_annotation(text_annotation("b", "brown", 10, 15)));
    let mut driver = HostDriver::new(&annotator);
    driver.settle();

    driver.move_to(96.0, 8.0);
    assert_eq!(annotator.state().hover().current(), None);
    assert!(!container_hovered(&annotator));
}
