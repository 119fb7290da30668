use maud::{html, Markup, PreEscaped, DOCTYPE};

const BASE_CSS: &str = "
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 1.5rem; color: #222; }
h1 { font-size: 1.3rem; margin-bottom: 0.2rem; }
.subtitle { color: #666; margin-top: 0; }
.map input[type=radio] { display: none; }
.tabs { display: flex; flex-wrap: wrap; gap: 0.4rem; margin: 0.8rem 0; }
.tabs label { padding: 0.25rem 0.7rem; border: 1px solid #bbb; border-radius: 4px; cursor: pointer; }
.frame { display: none; }
.frame svg { width: 100%; max-width: 900px; height: auto; }
.frame path { stroke: #ffffff; stroke-width: 0.6; fill-rule: evenodd; }
.frame path:hover { stroke: #222; stroke-width: 1.2; }
.legend { max-width: 420px; margin-top: 1rem; }
.legend .bar { height: 14px; border: 1px solid #ccc; }
.legend .ends { display: flex; justify-content: space-between; font-size: 0.85rem; }
.legend .note { font-size: 0.8rem; color: #666; }
footer { margin-top: 1.5rem; font-size: 0.8rem; color: #888; }
";

/// One polygon ready to draw.
pub struct Shape {
    pub path: String,
    pub fill: String,
    pub hover: String,
}

/// One switchable frame of the map (a bedroom category).
pub struct Frame {
    pub label: String,
    pub shapes: Vec<Shape>,
}

pub struct Legend {
    pub title: String,
    pub gradient: String,
    pub low: String,
    pub high: String,
    pub notes: Vec<String>,
}

pub struct MapPage<'a> {
    pub title: &'a str,
    pub subtitle: Option<String>,
    pub view_box: String,
    pub frames: Vec<Frame>,
    pub selected: usize,
    pub legend: Legend,
    pub footer: String,
}

/// CSS that shows the frame whose radio button is checked. Inputs, tab
/// labels and frames are siblings inside `.map`.
fn frame_css(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "#frame-{i}:checked ~ .frame-{i} {{ display: block; }}\n\
                 #frame-{i}:checked ~ .tabs label[for=frame-{i}] {{ background: #222; color: #fff; }}\n"
            )
        })
        .collect()
}

pub fn map_page(page: &MapPage<'_>) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (page.title) }
                style { (PreEscaped(BASE_CSS)) (PreEscaped(frame_css(page.frames.len()))) }
            }
            body {
                h1 { (page.title) }
                @if let Some(subtitle) = &page.subtitle {
                    p class="subtitle" { (subtitle) }
                }
                div class="map" {
                    @for (i, _) in page.frames.iter().enumerate() {
                        input type="radio" name="bedrooms" id=(format!("frame-{i}")) checked[i == page.selected];
                    }
                    nav class="tabs" {
                        @for (i, frame) in page.frames.iter().enumerate() {
                            label for=(format!("frame-{i}")) { "Bedrooms: " (frame.label) }
                        }
                    }
                    @for (i, frame) in page.frames.iter().enumerate() {
                        div class=(format!("frame frame-{i}")) {
                            svg xmlns="http://www.w3.org/2000/svg" viewBox=(page.view_box) role="img" {
                                @for shape in &frame.shapes {
                                    path d=(shape.path) fill=(shape.fill) {
                                        title { (shape.hover) }
                                    }
                                }
                            }
                        }
                    }
                }
                (legend(&page.legend))
                footer { (page.footer) }
            }
        }
    }
}

fn legend(legend: &Legend) -> Markup {
    html! {
        div class="legend" {
            strong { (legend.title) }
            div class="bar" style=(format!("background: {};", legend.gradient)) {}
            div class="ends" {
                span { (legend.low) }
                span { (legend.high) }
            }
            @for note in &legend.notes {
                p class="note" { (note) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(frames: Vec<Frame>) -> String {
        map_page(&MapPage {
            title: "Number of rentals",
            subtitle: Some("Auckland".to_string()),
            view_box: "0 0 100 100".to_string(),
            frames,
            selected: 1,
            legend: Legend {
                title: "Count".to_string(),
                gradient: "linear-gradient(to right, #000 0%, #fff 100%)".to_string(),
                low: "0".to_string(),
                high: "10".to_string(),
                notes: vec!["Grey: NA".to_string()],
            },
            footer: "generated".to_string(),
        })
        .into_string()
    }

    #[test]
    fn test_one_tab_and_frame_per_category() {
        let html = page(vec![
            Frame {
                label: "1".to_string(),
                shapes: vec![Shape {
                    path: "M0,0L1,1Z".to_string(),
                    fill: "#123456".to_string(),
                    hover: "A & B".to_string(),
                }],
            },
            Frame {
                label: "total".to_string(),
                shapes: Vec::new(),
            },
        ]);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("type=\"radio\"").count(), 2);
        assert!(html.contains("Bedrooms: total"));
        assert!(html.contains("class=\"frame frame-1\""));
        assert!(html.contains("#frame-1:checked ~ .frame-1"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("fill=\"#123456\""));
    }

    #[test]
    fn test_selected_frame_is_checked() {
        let frames = (0..3)
            .map(|i| Frame {
                label: i.to_string(),
                shapes: Vec::new(),
            })
            .collect();
        let html = page(frames);
        assert!(html.contains("id=\"frame-1\" checked"));
        assert!(!html.contains("id=\"frame-0\" checked"));
    }
}
