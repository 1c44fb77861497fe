//! Stage-ordered application of transformations.
use crate::errors::MoResult;
use crate::infer::ShapeInference;
use crate::model::cleanup::clean_up;
use crate::model::{Graph, Stage};
use crate::ops::OpRegistry;
use crate::transform::{
    FifoQueueReplacer, GatherElementsAxisNormalizer, HcReshapeMatMulFold, RemoveIdentity, RunMode,
    Transformation, TransformationKind,
};
use anyhow::{Context, bail};
use std::collections::HashSet;

mod schedule;

pub use self::schedule::schedule;

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub max_fixed_point_iterations: usize,
    /// Transformation ids left out of the schedule.
    pub disabled: HashSet<String>,
    pub stages: Vec<Stage>,
}

impl Default for PipelineOptions {
    fn default() -> PipelineOptions {
        PipelineOptions {
            max_fixed_point_iterations: 16,
            disabled: HashSet::new(),
            stages: Stage::ALL.to_vec(),
        }
    }
}

impl PipelineOptions {
    pub fn with_max_fixed_point_iterations(self, max: usize) -> PipelineOptions {
        PipelineOptions { max_fixed_point_iterations: max, ..self }
    }

    pub fn disable(mut self, id: impl Into<String>) -> PipelineOptions {
        self.disabled.insert(id.into());
        self
    }

    pub fn with_stages(self, stages: &[Stage]) -> PipelineOptions {
        PipelineOptions { stages: stages.to_vec(), ..self }
    }
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    registry: OpRegistry,
    transformations: Vec<Box<dyn Transformation>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(registry: OpRegistry) -> Pipeline {
        Pipeline { registry, transformations: vec![], options: PipelineOptions::default() }
    }

    /// Standard registry and the built-in transformations.
    pub fn standard() -> Pipeline {
        Pipeline::new(OpRegistry::standard())
            .with_transformation(FifoQueueReplacer)
            .with_transformation(RemoveIdentity)
            .with_transformation(HcReshapeMatMulFold)
            .with_transformation(GatherElementsAxisNormalizer)
    }

    pub fn with_transformation(mut self, t: impl Transformation + 'static) -> Pipeline {
        self.register(Box::new(t));
        self
    }

    pub fn register(&mut self, t: Box<dyn Transformation>) {
        self.transformations.push(t);
    }

    pub fn with_options(self, options: PipelineOptions) -> Pipeline {
        Pipeline { options, ..self }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OpRegistry {
        &mut self.registry
    }

    /// Enabled transformations, in execution order.
    pub fn schedule(&self) -> MoResult<Vec<&dyn Transformation>> {
        let enabled: Vec<&dyn Transformation> = self
            .transformations
            .iter()
            .map(|t| &**t)
            .filter(|t| !self.options.disabled.contains(&t.descriptor().id))
            .collect();
        let descriptors: Vec<_> = enabled.iter().map(|t| t.descriptor()).collect();
        let order = schedule(&descriptors)?;
        for ix in &order {
            debug!("scheduled {} ({})", descriptors[*ix].id, descriptors[*ix].stage);
        }
        Ok(order.into_iter().map(|ix| enabled[ix]).collect())
    }

    pub fn optimize(&self, graph: &mut Graph) -> MoResult<()> {
        self.session().optimize(graph)
    }

    pub fn session(&self) -> PipelineSession<'_> {
        PipelineSession { pipeline: self, counter: 0 }
    }
}

#[derive(Debug)]
pub struct PipelineSession<'p> {
    pipeline: &'p Pipeline,
    counter: usize,
}

impl PipelineSession<'_> {
    /// Number of transformation applications that changed the graph.
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn optimize(&mut self, graph: &mut Graph) -> MoResult<()> {
        let pipeline = self.pipeline;
        let schedule = pipeline.schedule()?;
        self.normalize(graph).context("Initial normalization")?;
        for stage in Stage::ALL {
            if !pipeline.options.stages.contains(&stage) {
                debug!("skipping {stage} stage");
                continue;
            }
            graph.stage = stage;
            for t in schedule.iter().filter(|t| t.descriptor().stage == stage) {
                self.run_one(*t, graph)
                    .with_context(|| format!("Running transformation {}", t.descriptor().id))?;
            }
        }
        info!("optimization done, {} rewrites applied", self.counter);
        Ok(())
    }

    pub fn run_one(&mut self, t: &dyn Transformation, graph: &mut Graph) -> MoResult<()> {
        let max = self.pipeline.options.max_fixed_point_iterations;
        match t.descriptor().mode {
            RunMode::Once => {
                self.apply(t, graph)?;
            }
            RunMode::FixedPoint => {
                for _ in 0..max {
                    if !self.apply(t, graph)? {
                        return Ok(());
                    }
                }
                bail!("No fixed point reached after {max} iterations");
            }
        }
        Ok(())
    }

    /// Applies `t` once, returning whether the graph changed.
    fn apply(&mut self, t: &dyn Transformation, graph: &mut Graph) -> MoResult<bool> {
        let descriptor = t.descriptor();
        let before = graph.revision();
        t.find_and_replace_pattern(graph)?;
        let changed = graph.revision() != before;
        if changed {
            self.counter += 1;
            debug!("applied {} (rewrite #{})", descriptor.id, self.counter);
        }
        if descriptor.kind == TransformationKind::PatternReplacement {
            self.normalize(graph)?;
        }
        Ok(changed)
    }

    fn normalize(&self, graph: &mut Graph) -> MoResult<()> {
        let report = clean_up(graph, &self.pipeline.registry)?;
        if !report.is_noop() {
            trace!("normalization: {report:?}");
        }
        ShapeInference::new(&self.pipeline.registry).infer_marked(graph)?;
        Ok(())
    }
}
