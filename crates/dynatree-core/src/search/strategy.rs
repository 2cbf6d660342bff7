//! Pluggable action strategies.
//!
//! The engine runs one loop for every variant. At each decision node it asks its
//! strategy whether a new action should be grown (`expand`), and otherwise which
//! tried action to descend into (`select`). `infer_value` scores actions that
//! were never simulated.

use rand::{Rng, RngCore};

use crate::model::EnvironmentModel;
use crate::search::{
    config::{ExpansionOrder, Variant},
    inference::{Inference, InferenceConfig, Neighbor, infer_value},
    selection::{TieBreak, argmax},
    widening::Widening,
};
use crate::tree::{
    edges::ucb,
    ids::{ActionNodeId, NodeId, TimeIndex},
    search_tree::Tree,
};

/// Read-only view of the node a strategy decides for.
pub struct SelectionContext<'a, M: EnvironmentModel> {
    pub model: &'a M,
    pub tree: &'a Tree<M::State, M::Action>,
    pub node: NodeId,
    /// Time the model should be queried at for this node.
    pub model_time: TimeIndex,
    pub exploration_constant: f64,
    pub tie_break: TieBreak,
}

/// A new action to attach to the current node.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal<A> {
    /// Take the untried action at this position of the node's action pool.
    Untried { position: usize },
    /// A freshly sampled action value.
    Sampled(A),
}

/// Capability interface shared by UCT, OLUCT and IQUCT.
pub trait ActionStrategy<M: EnvironmentModel> {
    /// Whether the node's enumerable action set must be loaded before `expand`.
    fn needs_action_pool(&self) -> bool {
        false
    }

    /// Propose a new action for the node, or `None` to descend into a tried one.
    fn expand(
        &self,
        ctx: &SelectionContext<'_, M>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Proposal<M::Action>>, M::Error>;

    /// Pick the tried action to descend into.
    fn select(&self, ctx: &SelectionContext<'_, M>, rng: &mut dyn RngCore) -> Option<ActionNodeId>;

    /// Estimate the value of an arbitrary action at the node from its tried siblings.
    fn infer_value(&self, _ctx: &SelectionContext<'_, M>, _action: &M::Action) -> Option<Inference> {
        None
    }
}

/// UCB1 over the tried children of the node.
fn select_ucb<M: EnvironmentModel>(
    ctx: &SelectionContext<'_, M>,
    rng: &mut dyn RngCore,
) -> Option<ActionNodeId> {
    let children = ctx.tree.children_of(ctx.node).ok()?;
    let n_parent = ctx.tree.node(ctx.node).ok()?.visits();
    argmax(
        children
            .into_iter()
            .map(|(id, action)| (id, action.ucb_score(n_parent, ctx.exploration_constant))),
        ctx.tie_break,
        rng,
    )
}

/// Whether a widening schedule lets the node grow, counting the visit in progress.
fn widening_allows<M: EnvironmentModel>(ctx: &SelectionContext<'_, M>, widening: &Widening) -> bool {
    match ctx.tree.node(ctx.node) {
        Ok(node) => widening.allows(node.children().len(), node.visits() + 1),
        Err(_) => false,
    }
}

/// Baseline discrete UCT: every legal action is tried once before UCB descent.
#[derive(Debug, Clone, Copy, Default)]
pub struct UctStrategy {
    pub order: ExpansionOrder,
}

impl<M: EnvironmentModel> ActionStrategy<M> for UctStrategy {
    fn needs_action_pool(&self) -> bool {
        true
    }

    fn expand(
        &self,
        ctx: &SelectionContext<'_, M>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Proposal<M::Action>>, M::Error> {
        let Ok(node) = ctx.tree.node(ctx.node) else {
            return Ok(None);
        };
        let untried = node.untried().len();
        if untried == 0 {
            return Ok(None);
        }
        let position = match self.order {
            ExpansionOrder::Listed => 0,
            ExpansionOrder::Random => rng.gen_range(0..untried),
        };
        Ok(Some(Proposal::Untried { position }))
    }

    fn select(&self, ctx: &SelectionContext<'_, M>, rng: &mut dyn RngCore) -> Option<ActionNodeId> {
        select_ucb(ctx, rng)
    }
}

/// Open-loop UCT for sampled actions: a new action is drawn whenever the
/// progressive widening bound leaves room for one.
#[derive(Debug, Clone, Copy)]
pub struct OlUctStrategy {
    pub widening: Widening,
}

impl<M: EnvironmentModel> ActionStrategy<M> for OlUctStrategy {
    fn expand(
        &self,
        ctx: &SelectionContext<'_, M>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Proposal<M::Action>>, M::Error> {
        if !widening_allows(ctx, &self.widening) {
            return Ok(None);
        }
        let Ok(node) = ctx.tree.node(ctx.node) else {
            return Ok(None);
        };
        let sampled = ctx.model.sample_action(node.state(), ctx.model_time, rng)?;
        Ok(sampled.map(Proposal::Sampled))
    }

    fn select(&self, ctx: &SelectionContext<'_, M>, rng: &mut dyn RngCore) -> Option<ActionNodeId> {
        select_ucb(ctx, rng)
    }
}

/// UCT with inferred values: proposals and tried actions are scored with the
/// interpolated value of their neighbourhood, and a proposal is only expanded
/// when it scores above the best tried action.
#[derive(Debug, Clone, Copy)]
pub struct IqUctStrategy {
    pub widening: Widening,
    pub inference: InferenceConfig,
}

impl IqUctStrategy {
    fn neighbors<M: EnvironmentModel>(
        &self,
        ctx: &SelectionContext<'_, M>,
        action: &M::Action,
    ) -> Vec<Neighbor> {
        ctx.tree
            .children_of(ctx.node)
            .map(|children| {
                children
                    .into_iter()
                    .map(|(_, sibling)| Neighbor {
                        distance: ctx.model.action_distance(action, sibling.action()),
                        value: sibling.q(),
                        visits: sibling.visits(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn inferred_score<M: EnvironmentModel>(
        &self,
        ctx: &SelectionContext<'_, M>,
        action: &M::Action,
    ) -> f64 {
        let n_parent = ctx.tree.node(ctx.node).map(|n| n.visits()).unwrap_or(0);
        match ActionStrategy::<M>::infer_value(self, ctx, action) {
            Some(inference) => ucb(
                inference.value,
                inference.confidence,
                n_parent,
                ctx.exploration_constant,
            ),
            None => f64::INFINITY,
        }
    }
}

impl<M: EnvironmentModel> ActionStrategy<M> for IqUctStrategy {
    fn expand(
        &self,
        ctx: &SelectionContext<'_, M>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Proposal<M::Action>>, M::Error> {
        if !widening_allows(ctx, &self.widening) {
            return Ok(None);
        }
        let Ok(node) = ctx.tree.node(ctx.node) else {
            return Ok(None);
        };

        let mut candidates = Vec::with_capacity(self.inference.candidates);
        for _ in 0..self.inference.candidates {
            if let Some(action) = ctx.model.sample_action(node.state(), ctx.model_time, rng)? {
                candidates.push(action);
            }
        }
        let scored: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, action)| (idx, self.inferred_score(ctx, action)))
            .collect();
        let Some(best) = argmax(scored.iter().copied(), ctx.tie_break, rng) else {
            return Ok(None);
        };
        let best_score = scored[best].1;

        if !node.children().is_empty() {
            let best_tried = ActionStrategy::<M>::select(self, ctx, rng)
                .and_then(|id| ctx.tree.action_node(id).ok())
                .map(|tried| self.inferred_score(ctx, tried.action()))
                .unwrap_or(f64::NEG_INFINITY);
            if best_score <= best_tried {
                return Ok(None);
            }
        }

        Ok(Some(Proposal::Sampled(candidates.swap_remove(best))))
    }

    fn select(&self, ctx: &SelectionContext<'_, M>, rng: &mut dyn RngCore) -> Option<ActionNodeId> {
        let children = ctx.tree.children_of(ctx.node).ok()?;
        argmax(
            children
                .into_iter()
                .map(|(id, action)| (id, self.inferred_score(ctx, action.action()))),
            ctx.tie_break,
            rng,
        )
    }

    fn infer_value(&self, ctx: &SelectionContext<'_, M>, action: &M::Action) -> Option<Inference> {
        infer_value(&self.neighbors(ctx, action), &self.inference)
    }
}

/// The strategy set a `Variant` selects.
#[derive(Debug, Clone, Copy)]
pub enum StrategySet {
    Uct(UctStrategy),
    OlUct(OlUctStrategy),
    IqUct(IqUctStrategy),
}

impl StrategySet {
    pub fn from_variant(variant: &Variant, order: ExpansionOrder) -> Self {
        match *variant {
            Variant::Uct => StrategySet::Uct(UctStrategy { order }),
            Variant::OlUct { widening } => StrategySet::OlUct(OlUctStrategy { widening }),
            Variant::IqUct {
                widening,
                inference,
            } => StrategySet::IqUct(IqUctStrategy {
                widening,
                inference,
            }),
        }
    }
}

impl<M: EnvironmentModel> ActionStrategy<M> for StrategySet {
    fn needs_action_pool(&self) -> bool {
        match self {
            StrategySet::Uct(s) => ActionStrategy::<M>::needs_action_pool(s),
            StrategySet::OlUct(s) => ActionStrategy::<M>::needs_action_pool(s),
            StrategySet::IqUct(s) => ActionStrategy::<M>::needs_action_pool(s),
        }
    }

    fn expand(
        &self,
        ctx: &SelectionContext<'_, M>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Proposal<M::Action>>, M::Error> {
        match self {
            StrategySet::Uct(s) => s.expand(ctx, rng),
            StrategySet::OlUct(s) => s.expand(ctx, rng),
            StrategySet::IqUct(s) => s.expand(ctx, rng),
        }
    }

    fn select(&self, ctx: &SelectionContext<'_, M>, rng: &mut dyn RngCore) -> Option<ActionNodeId> {
        match self {
            StrategySet::Uct(s) => s.select(ctx, rng),
            StrategySet::OlUct(s) => s.select(ctx, rng),
            StrategySet::IqUct(s) => s.select(ctx, rng),
        }
    }

    fn infer_value(&self, ctx: &SelectionContext<'_, M>, action: &M::Action) -> Option<Inference> {
        match self {
            StrategySet::Uct(s) => s.infer_value(ctx, action),
            StrategySet::OlUct(s) => s.infer_value(ctx, action),
            StrategySet::IqUct(s) => s.infer_value(ctx, action),
        }
    }
}
