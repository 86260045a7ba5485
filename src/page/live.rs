//! HTML-snapshot backed document.
//!
//! [`LivePage`] holds the current markup of a page and re-evaluates CSS
//! selectors against it with `scraper`. Swapping the snapshot via
//! [`LivePage::set_html`] behaves like the page mutating underneath the
//! controller:
//!
//! - `<video>` elements are tracked by their `id` attribute; an id that
//!   disappears disconnects its surface, a new id mounts a fresh one
//! - observed anchors get a [`MutationRecord`] whenever their `class`
//!   attribute changes between snapshots

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scraper::{Html, Selector};
use tokio::sync::broadcast;
use tracing::debug;

use super::{Document, ElementInfo, MutationRecord, PlaybackSurface, SimulatedSurface};

/// Mutation records buffered per observer.
const MUTATION_CAPACITY: usize = 32;

struct Observer {
    selector: String,
    classes: Vec<String>,
    tx: broadcast::Sender<MutationRecord>,
}

struct PageState {
    html: String,
    /// Mounted video surfaces keyed by element id.
    surfaces: HashMap<String, Arc<SimulatedSurface>>,
    observers: Vec<Observer>,
}

/// An in-memory page driven by successive HTML snapshots.
pub struct LivePage {
    origin: String,
    state: Mutex<PageState>,
}

impl LivePage {
    /// Create a page for `origin` with an initial snapshot.
    pub fn new(origin: impl Into<String>, html: &str) -> Self {
        let page = Self {
            origin: origin.into(),
            state: Mutex::new(PageState {
                html: String::new(),
                surfaces: HashMap::new(),
                observers: Vec::new(),
            }),
        };
        page.set_html(html);
        page
    }

    /// Replace the page markup.
    pub fn set_html(&self, html: &str) {
        let mut state = self.lock();
        state.html = html.to_string();

        let video_ids = video_element_ids(html);
        state.surfaces.retain(|id, surface| {
            let keep = video_ids.contains(id);
            if !keep {
                debug!("Video element #{id} removed, disconnecting {}", surface.id());
                surface.disconnect();
            }
            keep
        });
        for id in video_ids {
            state.surfaces.entry(id).or_insert_with_key(|id| {
                let surface = Arc::new(SimulatedSurface::new());
                debug!("Video element #{id} mounted as {}", surface.id());
                surface
            });
        }

        notify_observers(&mut state.observers, html);
    }

    /// The surface mounted for a `<video id=..>` element.
    pub fn surface(&self, element_id: &str) -> Option<Arc<SimulatedSurface>> {
        self.lock().surfaces.get(element_id).cloned()
    }

    /// The surface of the first `<video>` element in document order.
    pub fn active_surface(&self) -> Option<Arc<SimulatedSurface>> {
        let state = self.lock();
        let first = video_element_ids(&state.html).into_iter().next()?;
        state.surfaces.get(&first).cloned()
    }

    /// Number of installed mutation observers with a live receiver.
    pub fn observer_count(&self) -> usize {
        self.lock()
            .observers
            .iter()
            .filter(|o| o.tx.receiver_count() > 0)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Document for LivePage {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn query(&self, selector: &str) -> Option<ElementInfo> {
        query_html(&self.lock().html, selector)
    }

    fn find_surface(&self) -> Option<Arc<dyn PlaybackSurface>> {
        self.active_surface()
            .map(|surface| surface as Arc<dyn PlaybackSurface>)
    }

    fn observe(&self, selector: &str) -> Option<broadcast::Receiver<MutationRecord>> {
        let mut state = self.lock();
        let element = query_html(&state.html, selector)?;
        let (tx, rx) = broadcast::channel(MUTATION_CAPACITY);
        state.observers.push(Observer {
            selector: selector.to_string(),
            classes: element.classes,
            tx,
        });
        Some(rx)
    }
}

fn query_html(html: &str, selector: &str) -> Option<ElementInfo> {
    let selector = match Selector::parse(selector) {
        Ok(selector) => selector,
        Err(e) => {
            debug!("Invalid selector {selector:?}: {e:?}");
            return None;
        }
    };
    let document = Html::parse_document(html);
    let element = document.select(&selector).next()?;
    Some(ElementInfo {
        text: element.text().collect::<String>(),
        classes: element.value().classes().map(str::to_string).collect(),
    })
}

/// Push a record to every observer whose anchor changed its classes.
fn notify_observers(observers: &mut Vec<Observer>, html: &str) {
    observers.retain(|o| o.tx.receiver_count() > 0);
    for observer in observers.iter_mut() {
        let Some(element) = query_html(html, &observer.selector) else {
            continue;
        };
        if element.classes != observer.classes {
            observer.classes.clone_from(&element.classes);
            let _ = observer.tx.send(MutationRecord {
                selector: observer.selector.clone(),
                classes: element.classes,
            });
        }
    }
}

fn video_element_ids(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("video") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut ids: Vec<String> = Vec::new();
    for el in document.select(&selector) {
        let id = el.value().attr("id").unwrap_or_default().to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
