//! Items, their actions, and the pairs the matching layer passes around.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Callback executed when an action is activated.
pub type ActionFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A named, invocable operation on an item.
#[derive(Clone)]
pub struct Action {
    pub id: String,
    pub text: String,
    function: ActionFn,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        function: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            function: Arc::new(function),
        }
    }

    /// Run the action.
    pub fn activate(&self) -> anyhow::Result<()> {
        (self.function)()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// A result entity produced by a handler.
///
/// The core only reads the id and the strings handed to the index; everything
/// else is passed through to the presentation layer untouched.
pub trait Item: Send + Sync {
    /// Identifier, stable across queries for usage scoring.
    fn id(&self) -> &str;

    fn text(&self) -> &str;

    fn subtext(&self) -> &str {
        ""
    }

    /// Icon reference understood by the presentation layer.
    fn icon(&self) -> Option<&str> {
        None
    }

    fn actions(&self) -> Vec<Action> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id())
            .field("text", &self.text())
            .finish_non_exhaustive()
    }
}

/// General purpose [`Item`] implementation.
#[derive(Debug, Clone, Default)]
pub struct StandardItem {
    id: String,
    text: String,
    subtext: String,
    icon: Option<String>,
    actions: Vec<Action>,
}

impl StandardItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_subtext(mut self, subtext: impl Into<String>) -> Self {
        self.subtext = subtext.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn into_shared(self) -> Arc<dyn Item> {
        Arc::new(self)
    }
}

impl Item for StandardItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn subtext(&self) -> &str {
        &self.subtext
    }

    fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.clone()
    }
}

/// An item together with one string it should be found by.
#[derive(Clone)]
pub struct IndexItem {
    pub item: Arc<dyn Item>,
    pub string: String,
}

impl IndexItem {
    pub fn new(item: Arc<dyn Item>, string: impl Into<String>) -> Self {
        Self {
            item,
            string: string.into(),
        }
    }
}

/// An item paired with its relevance from one matching pass.
#[derive(Clone)]
pub struct RankItem {
    pub item: Arc<dyn Item>,
    pub score: f64,
}

impl RankItem {
    pub fn new(item: Arc<dyn Item>, score: f64) -> Self {
        Self { item, score }
    }

    /// Presentation order: higher score first, ties by text.
    pub fn best_first(a: &Self, b: &Self) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.item.text().cmp(b.item.text()))
    }
}

impl fmt::Debug for RankItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankItem")
            .field("id", &self.item.id())
            .field("score", &self.score)
            .finish()
    }
}
