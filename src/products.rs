//! The product-list fetch machine.
//!
//! `Idle --FETCH--> Loading`, where `Loading` invokes the `fetchProducts`
//! service. Success lands in the final `Success` state with the products in
//! `context.data` and `context.error` cleared; failure lands in `Error` with
//! the message in `context.error`, from where `RETRY` re-enters `Loading`.
//!
//! How products are fetched is up to the caller: any async function returning
//! `Result<Vec<Product>, String>` can be plugged in.

use crate::builder::BuildError;
use crate::core::{Context, Event, State};
use crate::machine::{Invoke, Machine, MachineDefinition, StateNode, Transition};
use crate::service::ServiceRegistry;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Service id of the product fetch.
pub const FETCH_PRODUCTS: &str = "fetchProducts";

/// Consumer event: start the first fetch.
pub const FETCH: &str = "FETCH";

/// Consumer event: fetch again after a failure.
pub const RETRY: &str = "RETRY";

/// States of the product fetch machine.
///
/// Named in lowercase, which is what renderers branch on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    Idle,
    Loading,
    Success,
    Error,
}

impl State for FetchState {
    fn name(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A product record as returned by the catalogue API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: f64,
}

impl Product {
    /// A product with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            images: Vec::new(),
            category: String::new(),
            price: 0.0,
        }
    }
}

/// Payload of the fetch machine's events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPayload {
    Products(Vec<Product>),
    Failure(String),
}

impl FetchPayload {
    pub fn products(&self) -> Option<&[Product]> {
        match self {
            FetchPayload::Products(products) => Some(products),
            FetchPayload::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            FetchPayload::Failure(message) => Some(message),
            FetchPayload::Products(_) => None,
        }
    }
}

/// Context of the fetch machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductContext {
    /// Products from the last successful fetch.
    pub data: Option<Vec<Product>>,
    /// Message from the last failed fetch.
    pub error: Option<String>,
}

/// Partial update of [`ProductContext`]. `None` leaves a field untouched,
/// `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductPatch {
    pub data: Option<Option<Vec<Product>>>,
    pub error: Option<Option<String>>,
}

impl Context for ProductContext {
    type Patch = ProductPatch;

    fn apply(&mut self, patch: ProductPatch) {
        if let Some(data) = patch.data {
            self.data = data;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
    }
}

type FetchTransition = Transition<FetchState, ProductContext, FetchPayload>;

/// The fetch machine's transition table.
pub fn product_definition() -> MachineDefinition<FetchState, ProductContext, FetchPayload> {
    let on_done: FetchTransition = Transition::to(FetchState::Success)
        .assign(|_ctx: &ProductContext, event: &Event<FetchPayload>| ProductPatch {
            data: Some(
                event
                    .payload()
                    .and_then(FetchPayload::products)
                    .map(<[Product]>::to_vec),
            ),
            ..ProductPatch::default()
        })
        // A success always clears the previous error.
        .set(ProductPatch {
            error: Some(None),
            ..ProductPatch::default()
        });

    let on_error: FetchTransition = Transition::to(FetchState::Error).assign(
        |_ctx: &ProductContext, event: &Event<FetchPayload>| ProductPatch {
            error: Some(
                event
                    .payload()
                    .and_then(FetchPayload::failure)
                    .map(str::to_string),
            ),
            ..ProductPatch::default()
        },
    );

    MachineDefinition::builder("products", FetchState::Idle, ProductContext::default())
        .state(
            FetchState::Idle,
            StateNode::new().on(FETCH, Transition::to(FetchState::Loading)),
        )
        .state(
            FetchState::Loading,
            StateNode::new().invoke(
                Invoke::new(FETCH_PRODUCTS)
                    .on_done(on_done)
                    .on_error(on_error),
            ),
        )
        .state(FetchState::Success, StateNode::terminal())
        .state(
            FetchState::Error,
            StateNode::new().on(RETRY, Transition::to(FetchState::Loading)),
        )
        .definition()
}

/// Build the fetch machine around `fetch`.
pub fn product_machine<F, Fut>(
    fetch: F,
) -> Result<Machine<FetchState, ProductContext, FetchPayload>, BuildError>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Product>, String>> + Send + 'static,
{
    let registry = ServiceRegistry::new().register(FETCH_PRODUCTS, move |_: &ProductContext| {
        let request = fetch();
        async move {
            request
                .await
                .map(FetchPayload::Products)
                .map_err(FetchPayload::Failure)
        }
    });

    Machine::new(product_definition(), registry)
}
