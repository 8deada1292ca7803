//! Turning a form's controls into a nested JSON object.
//!
//! Field names use bracket paths: `user[name]` sets a key of an object, `user[roles][]` appends to an array.

use crate::Error;
use serde_json::{Map, Number, Value};
use tracing::{trace, warn};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlButtonElement, HtmlFormElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

/// One step of a field name's key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Key(String),
	/// `[]`: appends to an array.
	Push,
}

/// Splits `a[b][]` into `[Key("a"), Key("b"), Push]`.
///
/// Names that aren't well-formed bracket paths are used as a single key.
#[must_use]
pub fn key_path(name: &str) -> Vec<Segment> {
	let plain = || vec![Segment::Key(name.to_owned())];
	let (head, mut rest) = match name.find('[') {
		Some(0) | None => return plain(),
		Some(open) => name.split_at(open),
	};

	let mut path = vec![Segment::Key(head.to_owned())];
	while !rest.is_empty() {
		let close = match (rest.strip_prefix('['), rest.find(']')) {
			(Some(_), Some(close)) => close,
			_ => return plain(),
		};
		let key = &rest[1..close];
		if key.contains('[') {
			return plain();
		}
		path.push(if key.is_empty() { Segment::Push } else { Segment::Key(key.to_owned()) });
		rest = &rest[close + 1..];
	}
	path
}

/// Stores `value` at `path` below `root`, creating objects and arrays on the way.
///
/// # Errors
///
/// [`Error::FieldConflict`] iff an existing value of another shape is in the way, e.g. for `a=1` followed by `a[b]=2`.
pub fn set_nested(root: &mut Map<String, Value>, name: &str, path: &[Segment], value: Value) -> Result<(), Error> {
	let conflict = || Error::FieldConflict(name.to_owned());
	let (first, rest) = match path.split_first() {
		Some((Segment::Key(key), rest)) => (key, rest),
		_ => return Err(conflict()),
	};

	if rest.is_empty() {
		root.insert(first.clone(), value);
		return Ok(());
	}
	let slot = root.entry(first.clone()).or_insert_with(|| empty_container(&rest[0]));
	set_in(slot, name, rest, value)
}

fn set_in(slot: &mut Value, name: &str, path: &[Segment], value: Value) -> Result<(), Error> {
	let conflict = || Error::FieldConflict(name.to_owned());
	let (segment, rest) = match path.split_first() {
		Some(split) => split,
		None => {
			*slot = value;
			return Ok(());
		}
	};

	match (segment, slot) {
		(Segment::Key(key), Value::Object(object)) => {
			if rest.is_empty() {
				object.insert(key.clone(), value);
				return Ok(());
			}
			let next = object.entry(key.clone()).or_insert_with(|| empty_container(&rest[0]));
			set_in(next, name, rest, value)
		}
		(Segment::Push, Value::Array(array)) => {
			if rest.is_empty() {
				array.push(value);
				return Ok(());
			}
			array.push(empty_container(&rest[0]));
			let last = array.last_mut().ok_or_else(conflict)?;
			set_in(last, name, rest, value)
		}
		_ => Err(conflict()),
	}
}

fn empty_container(next: &Segment) -> Value {
	match next {
		Segment::Key(_) => Value::Object(Map::new()),
		Segment::Push => Value::Array(Vec::new()),
	}
}

/// What kind of control a [`Field`] came from, as far as serialization cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	Text,
	/// Coerced to a JSON number.
	Number,
	/// Contributes `true` when checked and nothing otherwise.
	Checkbox { checked: bool },
	/// Contributes its value only when checked.
	Radio { checked: bool },
	/// Contributes its value only if it triggered the submission.
	Submit { active: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	pub name: String,
	pub kind: FieldKind,
	pub value: String,
}

impl Field {
	#[must_use]
	pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: FieldKind::Text,
			value: value.into(),
		}
	}

	fn json_value(&self) -> Option<Value> {
		match self.kind {
			FieldKind::Text => Some(Value::String(self.value.clone())),
			FieldKind::Number => Some(number(&self.value)),
			FieldKind::Checkbox { checked } => checked.then(|| Value::Bool(true)),
			FieldKind::Radio { checked } | FieldKind::Submit { active: checked } => checked.then(|| Value::String(self.value.clone())),
		}
	}
}

/// Parses a numeric control's value. Empty or unparsable input becomes `null`.
fn number(value: &str) -> Value {
	let value = value.trim();
	if let Ok(integer) = value.parse::<i64>() {
		return Value::Number(integer.into());
	}
	value.parse::<f64>().ok().and_then(Number::from_f64).map_or(Value::Null, Value::Number)
}

/// Assembles the nested payload of `fields`, in order.
///
/// # Errors
///
/// [`Error::FieldConflict`] iff two field names disagree about the shape of the payload.
pub fn serialize<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Result<Value, Error> {
	let mut root = Map::new();
	for field in fields {
		if let Some(value) = field.json_value() {
			set_nested(&mut root, &field.name, &key_path(&field.name), value)?;
		}
	}
	Ok(Value::Object(root))
}

/// Reads the serializable controls of `form`.
///
/// Controls without a name or id and controls that are disabled are skipped.
/// `submitter` marks which submit button (if any) triggered the submission.
#[must_use]
pub fn collect(form: &HtmlFormElement, submitter: Option<&Element>) -> Vec<Field> {
	let controls = form.elements();
	(0..controls.length())
		.filter_map(|i| controls.item(i))
		.filter(|control| !control.has_attribute("disabled"))
		.filter_map(|control| {
			let field = read_control(&control, submitter);
			if field.is_none() {
				trace!("Skipping control {:?}", control.tag_name());
			}
			field
		})
		.collect()
}

fn read_control(control: &Element, submitter: Option<&Element>) -> Option<Field> {
	let name = control
		.get_attribute("name")
		.filter(|name| !name.is_empty())
		.or_else(|| Some(control.id()).filter(|id| !id.is_empty()))?;
	let active = submitter.map_or(false, |submitter| submitter == control);

	let (kind, value) = if let Some(input) = control.dyn_ref::<HtmlInputElement>() {
		let kind = match input.type_().as_str() {
			"checkbox" => FieldKind::Checkbox { checked: input.checked() },
			"radio" => FieldKind::Radio { checked: input.checked() },
			"number" | "range" => FieldKind::Number,
			"submit" | "image" => FieldKind::Submit { active },
			"button" | "reset" | "file" => return None,
			_ => FieldKind::Text,
		};
		(kind, input.value())
	} else if let Some(button) = control.dyn_ref::<HtmlButtonElement>() {
		if button.type_() != "submit" {
			return None;
		}
		(FieldKind::Submit { active }, button.value())
	} else if let Some(select) = control.dyn_ref::<HtmlSelectElement>() {
		(FieldKind::Text, select.value())
	} else if let Some(textarea) = control.dyn_ref::<HtmlTextAreaElement>() {
		(FieldKind::Text, textarea.value())
	} else {
		return None;
	};

	Some(Field { name, kind, value })
}

/// Disables every control of a form for as long as it lives.
///
/// Dropping it restores exactly the controls that weren't disabled before.
pub struct DisabledControls {
	disabled: Vec<Element>,
}

impl DisabledControls {
	#[must_use]
	pub fn new(form: &HtmlFormElement) -> Self {
		let controls = form.elements();
		let disabled = (0..controls.length())
			.filter_map(|i| controls.item(i))
			.filter(|control| !control.has_attribute("disabled"))
			.filter(|control| match control.set_attribute("disabled", "") {
				Ok(()) => true,
				Err(error) => {
					warn!("Failed to disable control: {:?}", error);
					false
				}
			})
			.collect();
		Self { disabled }
	}
}

impl Drop for DisabledControls {
	fn drop(&mut self) {
		for control in &self.disabled {
			if let Err(error) = control.remove_attribute("disabled") {
				warn!("Failed to re-enable control: {:?}", error);
			}
		}
	}
}
