use crate::model::{Job, JobGroup, Pipeline, PipelineGroup};
use std::collections::BTreeMap;

pub const UNGROUPED: &str = "ungrouped";

/// Sections jobs by their first group. Sections come out in the order their
/// first job appears; jobs keep their input order.
pub fn group_jobs(jobs: Vec<Job>) -> Vec<JobGroup> {
    let mut groups: Vec<JobGroup> = Vec::new();
    for job in jobs {
        let name = job
            .groups
            .first()
            .map_or(UNGROUPED, String::as_str)
            .to_string();
        match groups.iter().position(|g| g.name == name) {
            Some(idx) => groups[idx].jobs.push(job),
            None => groups.push(JobGroup {
                name,
                jobs: vec![job],
            }),
        }
    }
    groups
}

/// Public pipelines sectioned by team, teams in ascending name order.
pub fn group_public_pipelines(pipelines: Vec<Pipeline>) -> Vec<PipelineGroup> {
    let mut by_team: BTreeMap<String, Vec<Pipeline>> = BTreeMap::new();
    for pipeline in pipelines.into_iter().filter(|p| p.public) {
        by_team
            .entry(pipeline.team_name.clone())
            .or_default()
            .push(pipeline);
    }
    by_team
        .into_iter()
        .map(|(team_name, pipelines)| PipelineGroup {
            team_name,
            pipelines,
        })
        .collect()
}
