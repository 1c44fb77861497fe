use crate::errors::{GraphError, MoResult};
use crate::model::Stage;
use crate::transform::TransformationDescriptor;
use anyhow::bail;
use std::collections::{BTreeSet, HashMap};

/// Orders transformations: stage first, then dependencies, then
/// registration order. Returns indices into `descriptors`.
pub fn schedule(descriptors: &[TransformationDescriptor]) -> MoResult<Vec<usize>> {
    let mut ids: HashMap<&str, usize> = HashMap::new();
    for (ix, d) in descriptors.iter().enumerate() {
        if ids.insert(&d.id, ix).is_some() {
            bail!("Transformation {} is registered twice", d.id);
        }
    }
    let mut successors: Vec<Vec<usize>> = vec![vec![]; descriptors.len()];
    let mut add_dep = |first: usize, then: usize| -> MoResult<()> {
        if descriptors[first].stage > descriptors[then].stage {
            return Err(GraphError::SchedulingCycle(vec![
                descriptors[first].id.clone(),
                descriptors[then].id.clone(),
            ])
            .into());
        }
        successors[first].push(then);
        Ok(())
    };
    for (ix, d) in descriptors.iter().enumerate() {
        for (dep, after) in
            d.run_after.iter().map(|a| (a, true)).chain(d.run_before.iter().map(|b| (b, false)))
        {
            let Some(&other) = ids.get(dep.as_str()) else {
                debug!("{}: ignoring dependency on unknown transformation {dep}", d.id);
                continue;
            };
            if after { add_dep(other, ix)? } else { add_dep(ix, other)? }
        }
    }

    let mut in_degree = vec![0usize; descriptors.len()];
    for succ in &successors {
        for &s in succ {
            in_degree[s] += 1;
        }
    }
    let mut ready: BTreeSet<(Stage, usize)> = (0..descriptors.len())
        .filter(|&ix| in_degree[ix] == 0)
        .map(|ix| (descriptors[ix].stage, ix))
        .collect();
    let mut order = Vec::with_capacity(descriptors.len());
    while let Some(next) = ready.pop_first() {
        let ix = next.1;
        order.push(ix);
        for &s in &successors[ix] {
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                ready.insert((descriptors[s].stage, s));
            }
        }
    }
    if order.len() < descriptors.len() {
        let cycle = find_cycle(&successors, &in_degree);
        return Err(GraphError::SchedulingCycle(
            cycle.into_iter().map(|ix| descriptors[ix].id.clone()).collect(),
        )
        .into());
    }
    Ok(order)
}

/// Walks the unscheduled nodes until one repeats.
fn find_cycle(successors: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let blocked = |ix: usize| in_degree[ix] > 0;
    let Some(start) = (0..in_degree.len()).find(|&ix| blocked(ix)) else { return vec![] };
    let mut path = vec![start];
    loop {
        let current = path[path.len() - 1];
        let Some(&next) = successors[current].iter().find(|&&s| blocked(s)) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;

    fn names(ds: &[TransformationDescriptor]) -> Vec<&str> {
        schedule(ds).unwrap().into_iter().map(|ix| ds[ix].id.as_str()).collect()
    }

    #[test]
    fn stage_then_registration() {
        let ds = [
            TransformationDescriptor::pattern("b1", Stage::Back),
            TransformationDescriptor::pattern("f1", Stage::Front),
            TransformationDescriptor::pattern("m1", Stage::Middle),
            TransformationDescriptor::pattern("f2", Stage::Front),
        ];
        assert_eq!(names(&ds), vec!["f1", "f2", "m1", "b1"]);
    }

    #[test]
    fn dependencies() {
        let ds = [
            TransformationDescriptor::pattern("a", Stage::Back).after("c"),
            TransformationDescriptor::pattern("b", Stage::Back).before("c"),
            TransformationDescriptor::pattern("c", Stage::Back).after("nope"),
        ];
        assert_eq!(names(&ds), vec!["b", "c", "a"]);
    }

    #[test]
    fn cycle() {
        let ds = [
            TransformationDescriptor::pattern("a", Stage::Back).after("b"),
            TransformationDescriptor::pattern("b", Stage::Back).after("a"),
        ];
        let e = schedule(&ds).unwrap_err();
        let Some(GraphError::SchedulingCycle(ids)) = error_kind(&e) else { panic!("{e:?}") };
        assert!(ids.contains(&"a".to_string()) && ids.contains(&"b".to_string()));
    }

    #[test]
    fn backward_across_stages() {
        let ds = [
            TransformationDescriptor::pattern("front", Stage::Front).after("back"),
            TransformationDescriptor::pattern("back", Stage::Back),
        ];
        let e = schedule(&ds).unwrap_err();
        assert!(matches!(error_kind(&e), Some(GraphError::SchedulingCycle(_))));
    }

    #[test]
    fn duplicate_ids() {
        let ds = [
            TransformationDescriptor::pattern("a", Stage::Back),
            TransformationDescriptor::pattern("a", Stage::Front),
        ];
        assert!(schedule(&ds).is_err());
    }
}
