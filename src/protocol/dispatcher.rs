//! Request dispatcher (spec §6: "the dispatcher routes to a handler...
//! see the project/data-frame/pipeline managers").
//!
//! `Request::type_` selects the manager (`"project"`, `"data_frame"`,
//! `"pipeline"`); `Request::name_` names the target entity; `payload.op`
//! names the operation and carries its arguments. Every project-scoped
//! operation also expects `payload.project` naming which project to open.

use crate::frame::Df;
use crate::pipeline::{Pipeline, PipelineHyperparameters};
use crate::placeholder::Placeholder;
use crate::project::Project;
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::wire::{Request, Response};
use crate::storage::csv;
use std::path::Path;

fn op<'a>(req: &'a Request) -> ProtocolResult<&'a str> {
    req.payload
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProtocolError::UnknownOperation { type_: req.type_.clone(), op: "<missing>".to_string() })
}

fn project_name<'a>(req: &'a Request) -> ProtocolResult<&'a str> {
    req.payload
        .get("project")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProtocolError::Engine(crate::error::EngineError::validation("payload missing 'project'")))
}

fn open_project(projects_root: &Path, req: &Request) -> ProtocolResult<Project> {
    Ok(Project::open_or_create(projects_root, project_name(req)?)?)
}

/// Routes one request to its handler, converting any failure into an
/// error response rather than propagating it — the connection stays open
/// regardless of whether an individual request succeeded.
pub fn dispatch(projects_root: &Path, req: &Request) -> Response {
    match dispatch_inner(projects_root, req) {
        Ok(response) => response,
        Err(e) => e.to_response(),
    }
}

fn dispatch_inner(projects_root: &Path, req: &Request) -> ProtocolResult<Response> {
    match req.type_.as_str() {
        "project" => dispatch_project(projects_root, req),
        "data_frame" => dispatch_data_frame(projects_root, req),
        "pipeline" => dispatch_pipeline(projects_root, req),
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

fn dispatch_project(projects_root: &Path, req: &Request) -> ProtocolResult<Response> {
    match op(req)? {
        "list_projects" => {
            let names = Project::list_projects(projects_root)?;
            Ok(Response::status(names.join(",")))
        }
        "list_data_frames" => {
            let project = Project::open(projects_root, &req.name_)?;
            Ok(Response::status(project.list_data_frames().join(",")))
        }
        "list_pipelines" => {
            let project = Project::open(projects_root, &req.name_)?;
            Ok(Response::status(project.list_pipelines().join(",")))
        }
        "delete" => {
            let project = Project::open(projects_root, &req.name_)?;
            project.delete()?;
            Ok(Response::status("Success!"))
        }
        other => Err(ProtocolError::UnknownOperation { type_: "project".to_string(), op: other.to_string() }),
    }
}

fn dispatch_data_frame(projects_root: &Path, req: &Request) -> ProtocolResult<Response> {
    match op(req)? {
        "from_csv" => {
            let project = open_project(projects_root, req)?;
            let path = req
                .payload
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProtocolError::Engine(crate::error::EngineError::validation("payload missing 'path'")))?;
            let df = csv::load_df_from_csv(path, req.name_.clone(), project.cat_encoding(), project.jk_encoding())?;
            project.put_data_frame(df);
            project.save_data_frame(&req.name_)?;
            Ok(Response::status("Success!"))
        }
        "save" => {
            let project = open_project(projects_root, req)?;
            project.save_data_frame(&req.name_)?;
            Ok(Response::status("Success!"))
        }
        "load" => {
            let project = open_project(projects_root, req)?;
            project.data_frame(&req.name_)?;
            Ok(Response::status("Found!"))
        }
        other => Err(ProtocolError::UnknownOperation { type_: "data_frame".to_string(), op: other.to_string() }),
    }
}

fn dispatch_pipeline(projects_root: &Path, req: &Request) -> ProtocolResult<Response> {
    match op(req)? {
        "fit" => {
            let project = open_project(projects_root, req)?;
            let population_name = req
                .payload
                .get("population")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProtocolError::Engine(crate::error::EngineError::validation("payload missing 'population'")))?;
            let peripheral_names: Vec<String> = req
                .payload
                .get("peripheral")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let placeholder: Placeholder = serde_json::from_value(
                req.payload.get("placeholder").cloned().unwrap_or(serde_json::Value::Null),
            )?;
            let hyper: PipelineHyperparameters = match req.payload.get("hyper") {
                Some(v) => serde_json::from_value(v.clone())?,
                None => PipelineHyperparameters::default(),
            };

            let population: Df = (*project.data_frame(population_name)?).clone();
            let peripheral: Vec<Df> = peripheral_names
                .iter()
                .map(|n| project.data_frame(n).map(|df| (*df).clone()))
                .collect::<Result<_, _>>()?;

            let (pipeline, features, warner) = Pipeline::fit(population, peripheral, placeholder, hyper)?;
            project.put_pipeline(req.name_.clone(), pipeline);
            project.put_data_frame(features);
            project.save_pipeline(&req.name_)?;

            let message = if warner.is_empty() {
                "Success!".to_string()
            } else {
                format!("Success! ({} warnings)", warner.warnings().len())
            };
            Ok(Response::status(message))
        }
        "transform" => {
            let project = open_project(projects_root, req)?;
            let pipeline = project.pipeline(&req.name_)?;
            let population_name = req
                .payload
                .get("population")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProtocolError::Engine(crate::error::EngineError::validation("payload missing 'population'")))?;
            let peripheral_names: Vec<String> = req
                .payload
                .get("peripheral")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();

            let population: Df = (*project.data_frame(population_name)?).clone();
            let peripheral: Vec<Df> = peripheral_names
                .iter()
                .map(|n| project.data_frame(n).map(|df| (*df).clone()))
                .collect::<Result<_, _>>()?;

            let features = pipeline.transform(population, peripheral)?;
            project.put_data_frame(features);
            Ok(Response::status("Success!"))
        }
        "save" => {
            let project = open_project(projects_root, req)?;
            project.save_pipeline(&req.name_)?;
            Ok(Response::status("Success!"))
        }
        "load" => {
            let project = open_project(projects_root, req)?;
            project.pipeline(&req.name_)?;
            Ok(Response::status("Found!"))
        }
        "feature_importances" => {
            let project = open_project(projects_root, req)?;
            let pipeline = project.pipeline(&req.name_)?;
            let importances = pipeline.feature_importances();
            Ok(Response::status(
                importances.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(","),
            ))
        }
        other => Err(ProtocolError::UnknownOperation { type_: "pipeline".to_string(), op: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::{CatCol, NumCol};
    use serde_json::json;
    use tempfile::tempdir;

    fn write_csv(dir: &Path, file: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn from_csv_then_list_data_frames_round_trips() {
        let root = tempdir().unwrap();
        let csv_path = write_csv(root.path(), "pop.csv", "x,y\n1,10\n2,20\n");

        let from_csv = Request {
            type_: "data_frame".to_string(),
            name_: "population".to_string(),
            payload: json!({"op": "from_csv", "project": "p1", "path": csv_path.to_string_lossy()}),
        };
        let resp = dispatch(root.path(), &from_csv);
        assert!(matches!(resp, Response::Status { .. }));

        let list = Request {
            type_: "project".to_string(),
            name_: "p1".to_string(),
            payload: json!({"op": "list_data_frames"}),
        };
        match dispatch(root.path(), &list) {
            Response::Status { message } => assert_eq!(message, "population"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_produces_error_response() {
        let root = tempdir().unwrap();
        let req =
            Request { type_: "bogus".to_string(), name_: String::new(), payload: json!({"op": "noop"}) };
        match dispatch(root.path(), &req) {
            Response::Error { .. } => {}
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    #[test]
    fn pipeline_fit_end_to_end_through_the_dispatcher() {
        let root = tempdir().unwrap();
        let project = Project::create(root.path(), "p1").unwrap();

        let mut pop = Df::new("population", 2).with_encodings(project.cat_encoding(), project.jk_encoding());
        pop.add_join_key(CatCol::from_vec("jk", vec![0, 1])).unwrap();
        pop.add_target(NumCol::from_vec("target", vec![1.0, 2.0])).unwrap();
        project.put_data_frame(pop);

        let mut perip = Df::new("peripheral", 2).with_encodings(project.cat_encoding(), project.jk_encoding());
        perip.add_join_key(CatCol::from_vec("jk", vec![0, 1])).unwrap();
        perip.add_numerical(NumCol::from_vec("amount", vec![5.0, 6.0])).unwrap();
        project.put_data_frame(perip);
        project.save_all().unwrap();

        let placeholder = json!({
            "table_name": "population",
            "alias": null,
            "targets": ["target"],
            "edges": [{
                "left_key_col": "jk", "right_key_col": "jk",
                "left_ts_col": null, "right_ts_col": null, "right_upper_ts_col": null,
                "horizon": 0.0, "memory": null, "relationship": "ManyToMany",
                "allow_lagged_targets": false,
                "child": {"table_name": "peripheral", "alias": null, "targets": [], "edges": []}
            }]
        });
        let fit = Request {
            type_: "pipeline".to_string(),
            name_: "m1".to_string(),
            payload: json!({
                "op": "fit", "project": "p1",
                "population": "population", "peripheral": ["peripheral"],
                "placeholder": placeholder,
                "hyper": {"learner": "FastPropOnly", "add_imputation_dummies": true, "loss_name": "SquareLoss", "ensemble": {"num_trees": 1, "sampling_factor": 1.0, "tree": {"lambda": 1.0, "gamma": 0.0, "min_samples_leaf": 1, "max_depth": 2, "num_thresholds": 4, "shrinkage": 1.0}, "num_threads": 1}, "rng_seed": 1}
            }),
        };
        match dispatch(root.path(), &fit) {
            Response::Status { message } => assert!(message.starts_with("Success!")),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
