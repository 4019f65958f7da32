/// Field order for the graph-derived cloze model. `uuid` first so the
/// identifier is the note's sort field.
pub const MODEL_FIELDS: &[&str] = &["uuid", "Text", "Extra", "Breadcrumb"];

pub const FRONT_TEMPLATE: &str = r#"{{cloze:Text}}
<div class="breadcrumb">{{Breadcrumb}}</div>"#;

pub const BACK_TEMPLATE: &str = r#"{{cloze:Text}}
<hr id="extra">
{{Extra}}
<div class="breadcrumb">{{Breadcrumb}}</div>"#;
