//! Headless widget tree.
//!
//! Widgets are shared handles built and mutated on the UI thread of a
//! [`UiDispatcher`]; any thread may render them as indented text.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use windrose_registry::{Properties, ServiceHandle, ServiceRegistry};
use windrose_worker::UiDispatcher;

use crate::UI_LOADER_SPEC;

pub type TableRef = Arc<Mutex<Table>>;
pub type GaugeRef = Arc<Mutex<Gauge>>;
pub type TabsRef = Arc<Mutex<Tabs>>;

/// Rows of cells; the first cell of a row identifies it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
	headers: Vec<String>,
	rows: Vec<Vec<String>>,
}

fn cmp_ident(a: &str, b: &str) -> Ordering {
	match (a.parse::<u64>(), b.parse::<u64>()) {
		(Ok(a), Ok(b)) => a.cmp(&b),
		_ => a.cmp(b),
	}
}

impl Table {
	pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
		Self {
			headers: headers.into_iter().map(Into::into).collect(),
			rows: Vec::new(),
		}
	}

	pub fn find_row(&self, ident: &str) -> Option<usize> {
		self.rows.iter().position(|row| row.first().is_some_and(|cell| cell == ident))
	}

	/// Replaces the row identified by `ident`, or inserts it in identifier order.
	pub fn upsert_line(&mut self, ident: &str, values: Vec<String>) {
		let mut row = Vec::with_capacity(values.len() + 1);
		row.push(ident.to_string());
		row.extend(values);
		if row.len() < self.headers.len() {
			row.resize(self.headers.len(), String::new());
		}
		match self.find_row(ident) {
			Some(index) => self.rows[index] = row,
			None => {
				self.rows.push(row);
				self.rows.sort_by(|a, b| cmp_ident(&a[0], &b[0]));
			}
		}
	}

	pub fn remove_line(&mut self, ident: &str) -> bool {
		match self.find_row(ident) {
			Some(index) => {
				self.rows.remove(index);
				true
			}
			None => false,
		}
	}

	fn render_into(&self, out: &mut String, indent: usize) {
		let columns = self.headers.len().max(self.rows.iter().map(Vec::len).max().unwrap_or(0));
		let mut widths = vec![0; columns];
		for row in std::iter::once(&self.headers).chain(&self.rows) {
			for (i, cell) in row.iter().enumerate() {
				widths[i] = widths[i].max(cell.chars().count());
			}
		}
		for row in std::iter::once(&self.headers).chain(&self.rows) {
			let cells: Vec<String> = (0..columns)
				.map(|i| format!("{:<width$}", row.get(i).map(String::as_str).unwrap_or(""), width = widths[i]))
				.collect();
			let _ = writeln!(out, "{:indent$}{}", "", cells.join(" | ").trim_end());
		}
	}
}

/// Heading display in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
	title: String,
	value: Option<f64>,
}

/// Eight-point compass direction of a heading in degrees.
pub fn cardinal(degrees: f64) -> &'static str {
	const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
	let normalized = degrees.rem_euclid(360.0);
	POINTS[((normalized + 22.5) / 45.0) as usize % POINTS.len()]
}

impl Gauge {
	pub fn new(title: impl Into<String>) -> Self {
		Self { title: title.into(), value: None }
	}

	pub fn set(&mut self, value: f64) {
		self.value = Some(value);
	}

	fn render_into(&self, out: &mut String, indent: usize) {
		match self.value {
			Some(value) => {
				let _ = writeln!(out, "{:indent$}{}: {value:.1}° {}", "", self.title, cardinal(value));
			}
			None => {
				let _ = writeln!(out, "{:indent$}{}: --", "", self.title);
			}
		}
	}
}

/// Titled pages.
#[derive(Default, Clone)]
pub struct Tabs {
	tabs: Vec<(String, Widget)>,
}

impl Tabs {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_tab(&mut self, title: impl Into<String>, widget: Widget) {
		self.tabs.push((title.into(), widget));
	}

	pub fn index_of(&self, widget: &Widget) -> Option<usize> {
		self.tabs.iter().position(|(_, w)| w.same(widget))
	}

	pub fn remove_tab(&mut self, index: usize) -> Option<(String, Widget)> {
		(index < self.tabs.len()).then(|| self.tabs.remove(index))
	}

	pub fn titles(&self) -> Vec<&str> {
		self.tabs.iter().map(|(title, _)| title.as_str()).collect()
	}

}

/// A node of the widget tree.
#[derive(Clone)]
pub enum Widget {
	Table(TableRef),
	Gauge(GaugeRef),
	Tabs(TabsRef),
}

impl std::fmt::Debug for Widget {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let kind = match self {
			Self::Table(_) => "Table",
			Self::Gauge(_) => "Gauge",
			Self::Tabs(_) => "Tabs",
		};
		f.debug_tuple("Widget").field(&kind).finish()
	}
}

impl Widget {
	/// Identity comparison.
	pub fn same(&self, other: &Widget) -> bool {
		match (self, other) {
			(Self::Table(a), Self::Table(b)) => Arc::ptr_eq(a, b),
			(Self::Gauge(a), Self::Gauge(b)) => Arc::ptr_eq(a, b),
			(Self::Tabs(a), Self::Tabs(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	pub fn render(&self) -> String {
		let mut out = String::new();
		self.render_into(&mut out, 0);
		out
	}

	fn render_into(&self, out: &mut String, indent: usize) {
		match self {
			Self::Table(table) => table.lock().render_into(out, indent),
			Self::Gauge(gauge) => gauge.lock().render_into(out, indent),
			Self::Tabs(tabs) => {
				// Children lock themselves; render from a snapshot.
				let pages = tabs.lock().tabs.clone();
				for (title, widget) in pages {
					let _ = writeln!(out, "{:indent$}[{title}]", "");
					widget.render_into(out, indent + 2);
				}
			}
		}
	}
}

/// Publishes `ui` as the UI loader service of `registry`.
pub fn register_loader(registry: &ServiceRegistry, ui: &UiDispatcher) -> ServiceHandle {
	registry.register([UI_LOADER_SPEC], Properties::new(), ui.clone())
}

/// Schedules `callback` on the UI thread; a stopped UI drops it.
pub fn run_on_ui(ui: &UiDispatcher, what: &'static str, callback: impl FnOnce() + Send + 'static) {
	if ui.run_on_ui(callback).is_err() {
		tracing::debug!(what, "ui.gone");
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn table_lines_are_kept_in_identifier_order() {
		let mut table = Table::new(["ID", "Specifications"]);
		table.upsert_line("10", vec!["b".into()]);
		table.upsert_line("2", vec!["a".into()]);
		table.upsert_line("10", vec!["c".into()]);
		assert_eq!(table.rows, vec![vec!["2".to_string(), "a".into()], vec!["10".to_string(), "c".into()]]);
		assert!(table.remove_line("2"));
		assert!(!table.remove_line("2"));
		assert_eq!(table.rows.len(), 1);
	}

	#[test]
	fn short_rows_are_padded_to_the_headers() {
		let mut table = Table::new(["ID", "Specifications", "Properties"]);
		table.upsert_line("1", Vec::new());
		assert_eq!(table.rows[0].len(), 3);
	}

	#[test]
	fn cardinal_points_wrap_around() {
		assert_eq!(cardinal(0.0), "N");
		assert_eq!(cardinal(359.0), "N");
		assert_eq!(cardinal(-90.0), "W");
		assert_eq!(cardinal(135.0), "SE");
		assert_eq!(cardinal(720.0 + 45.0), "NE");
	}

	#[test]
	fn tabs_find_widgets_by_identity() {
		let first = Widget::Table(Arc::new(Mutex::new(Table::new(["ID"]))));
		let twin = Widget::Table(Arc::new(Mutex::new(Table::new(["ID"]))));
		let mut tabs = Tabs::new();
		tabs.add_tab("a", first.clone());
		assert_eq!(tabs.index_of(&first), Some(0));
		assert_eq!(tabs.index_of(&twin), None);
		assert_eq!(tabs.remove_tab(0).map(|(title, _)| title), Some("a".to_string()));
		assert!(tabs.remove_tab(0).is_none());
	}

	#[test]
	fn trees_render_as_indented_text() {
		let table = Arc::new(Mutex::new(Table::new(["ID", "Specifications"])));
		table.lock().upsert_line("1", vec!["windrose.probe".into()]);
		let gauge = Arc::new(Mutex::new(Gauge::new("Heading")));
		gauge.lock().set(90.0);
		let inner = Arc::new(Mutex::new(Tabs::new()));
		inner.lock().add_tab("Services", Widget::Table(table));
		inner.lock().add_tab("Compass", Widget::Gauge(gauge));
		let root = Arc::new(Mutex::new(Tabs::new()));
		root.lock().add_tab("Local", Widget::Tabs(inner));

		let expected = "\
[Local]
  [Services]
    ID | Specifications
    1  | windrose.probe
  [Compass]
    Heading: 90.0° E
";
		assert_eq!(Widget::Tabs(root).render(), expected);
	}
}
