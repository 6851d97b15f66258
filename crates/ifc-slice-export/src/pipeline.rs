// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Top-level export driver
//!
//! A run goes through fixed phases: context injection, the closure for the
//! requested export kind, context parents, the integrity pass, grid pruning
//! and the write. Cancellation is checked between phases and between roots.

use crate::cancel::CancellationToken;
use crate::closure::{ClosureBuilder, ClosureSummary};
use crate::filter::{filtered_relation, RelationKind};
use crate::identity::IdentityPolicy;
use crate::integrity::{HealedReference, ReferenceIntegrityChecker};
use crate::report::{ExportReport, DEFAULT_FAILURE_THRESHOLD};
use crate::session::{ExportSession, StageOutcome};
use crate::{ExportError, Result};
use ifc_slice_model::{
    DecodedEntity, EntityId, IfcModel, IfcType, ProgressCallback, SchemaVersion,
};
use ifc_slice_parser::OutputModel;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Entity types every export carries so the file stands on its own
pub const CONTEXT_TYPES: [IfcType; 5] = [
    IfcType::IfcProject,
    IfcType::IfcBuilding,
    IfcType::IfcSite,
    IfcType::IfcOrganization,
    IfcType::IfcPerson,
];

/// What the roots of a request are
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Assemblies,
    Phases,
}

/// Defaults a request is built from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub identity: IdentityPolicy,
    pub include_grids: bool,
    /// Target schema; `None` keeps the source file's schema
    pub schema: Option<SchemaVersion>,
    /// Rejected share above which the report flags the run
    pub failure_threshold: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            identity: IdentityPolicy::default(),
            include_grids: false,
            schema: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// One export to perform
#[derive(Clone, Debug)]
pub struct ExportRequest {
    pub kind: ExportKind,
    pub roots: Vec<EntityId>,
    pub identity: IdentityPolicy,
    pub include_grids: bool,
    pub schema: SchemaVersion,
    pub destination: PathBuf,
}

impl ExportRequest {
    pub fn new(kind: ExportKind, roots: Vec<EntityId>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            roots,
            identity: IdentityPolicy::default(),
            include_grids: false,
            schema: SchemaVersion::default(),
            destination: destination.into(),
        }
    }

    /// Request taking policy, grids and schema from `options`
    pub fn from_options(
        kind: ExportKind,
        roots: Vec<EntityId>,
        destination: impl Into<PathBuf>,
        options: &ExportOptions,
        source_schema: Option<SchemaVersion>,
    ) -> Self {
        Self::new(kind, roots, destination)
            .with_identity(options.identity)
            .with_grids(options.include_grids)
            .with_schema(options.schema.or(source_schema).unwrap_or_default())
    }

    pub fn with_identity(mut self, identity: IdentityPolicy) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_grids(mut self, include_grids: bool) -> Self {
        self.include_grids = include_grids;
        self
    }

    pub fn with_schema(mut self, schema: SchemaVersion) -> Self {
        self.schema = schema;
        self
    }
}

/// Output model of a run that has not been written yet
#[derive(Debug)]
pub struct BuiltExport {
    pub output: OutputModel,
    pub report: ExportReport,
    pub healed: Vec<HealedReference>,
    pub closure: ClosureSummary,
}

/// Outcome of a written export
#[derive(Clone, Debug, Serialize)]
pub struct ExportResult {
    pub path: PathBuf,
    pub entities_written: usize,
    pub report: ExportReport,
    pub healed: Vec<HealedReference>,
}

/// Export driver over one loaded source model
pub struct ExportPipeline {
    model: Arc<dyn IfcModel>,
    options: ExportOptions,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl ExportPipeline {
    pub fn new(model: Arc<dyn IfcModel>) -> Self {
        Self {
            model,
            options: ExportOptions::default(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Report (phase, percent) as the run advances
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn progress(&self, phase: &str, percent: f32) {
        if let Some(callback) = &self.progress {
            callback(phase, percent);
        }
    }

    /// Run the export and write the file
    pub fn run(&self, request: &ExportRequest) -> Result<ExportResult> {
        let BuiltExport {
            output,
            mut report,
            healed,
            ..
        } = self.build(request)?;

        self.progress("Writing file", 90.0);
        let summary = output
            .write(&request.destination)
            .map_err(ExportError::Write)?;

        report.entities_written = summary.entities;
        report.dangling_written = summary.dangling;
        report.finish();
        if !report.is_trustworthy() {
            log::warn!(
                "Export to {} is incomplete: {} rejected, {} unresolved, {} dangling",
                request.destination.display(),
                report.rejected,
                report.unresolved,
                report.dangling_written
            );
        }
        log::info!(
            "Exported {} roots as {} entities to {}",
            request.roots.len(),
            summary.entities,
            request.destination.display()
        );
        self.progress("Complete", 100.0);

        Ok(ExportResult {
            path: request.destination.clone(),
            entities_written: summary.entities,
            report,
            healed,
        })
    }

    /// Run every phase except the write
    pub fn build(&self, request: &ExportRequest) -> Result<BuiltExport> {
        let resolver = self.model.resolver();
        self.progress("Resolving roots", 0.0);

        if request.roots.is_empty() {
            return Err(match request.kind {
                ExportKind::Assemblies => ExportError::NoAssembliesFound,
                ExportKind::Phases => ExportError::NoPhasesFound,
            });
        }
        let roots = request
            .roots
            .iter()
            .map(|id| resolver.get(*id).ok_or(ExportError::EntityNotFound(*id)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = ExportSession::new(resolver, request.identity, request.schema)
            .with_cancellation(self.cancel.clone())
            .with_failure_threshold(self.options.failure_threshold);

        self.progress("Staging context", 5.0);
        let context = self.stage_context(&mut session);
        session.check_cancelled()?;

        self.progress("Building closure", 20.0);
        let closure = {
            let mut builder = ClosureBuilder::new(&mut session);
            match request.kind {
                ExportKind::Assemblies => builder.export_assemblies(&roots)?,
                ExportKind::Phases => builder.export_phases(&roots)?,
            }
        };
        session.check_cancelled()?;

        self.progress("Staging context relations", 60.0);
        self.stage_context_parents(&mut session, &context);
        session.check_cancelled()?;

        self.progress("Checking references", 70.0);
        let healed = ReferenceIntegrityChecker::check(&mut session);
        session.check_cancelled()?;

        let (mut output, mut report) = session.into_parts();
        if !request.include_grids {
            self.progress("Removing grids", 80.0);
            let pruning = prune_grids(&mut output);
            report.grids_removed = pruning.grids;
            report.grid_dependents_removed = pruning.dependents();
        }

        Ok(BuiltExport {
            output,
            report,
            healed,
            closure,
        })
    }

    /// Stage every context entity with its forward closure
    fn stage_context(&self, session: &mut ExportSession<'_>) -> Vec<Arc<DecodedEntity>> {
        let resolver = session.resolver();
        let mut context = Vec::new();
        for ifc_type in &CONTEXT_TYPES {
            for entity in resolver.entities_by_type(ifc_type) {
                session.stage_with_children(&entity);
                context.push(entity);
            }
        }
        log::info!("Staged {} context entities", context.len());
        context
    }

    /// Stage what directly references the context entities
    ///
    /// Known relations are filtered to what has been staged so far, so the
    /// project's decomposition does not drag the whole building in. Other
    /// relations are left out.
    fn stage_context_parents(&self, session: &mut ExportSession<'_>, context: &[Arc<DecodedEntity>]) {
        let resolver = session.resolver();

        for entity in context {
            for parent in resolver.inverse_entities(entity.id) {
                if session.is_staged(parent.id) {
                    continue;
                }

                match RelationKind::of(&parent.ifc_type) {
                    Some(kind) => {
                        let allowed: FxHashSet<EntityId> = session.closure().added().collect();
                        let copy = match filtered_relation(&parent, kind.filterable_attribute(), &allowed) {
                            Ok(copy) => copy,
                            Err(e) => {
                                session.record_error(ExportError::AttributeAccess(e));
                                continue;
                            }
                        };
                        if targets_nothing(&copy, kind) {
                            log::debug!(
                                "Skipping {} {}: no staged targets",
                                parent.ifc_type,
                                parent.id
                            );
                            continue;
                        }
                        if session.stage(&copy) == StageOutcome::Added {
                            session.stage_children(&copy);
                        }
                    }
                    None if parent.ifc_type.is_relationship() => {
                        log::debug!(
                            "Skipping {} {} referencing context {}",
                            parent.ifc_type,
                            parent.id,
                            entity.id
                        );
                    }
                    None => {
                        session.stage_with_children(&parent);
                    }
                }
            }
        }
    }

    /// Run the export on a dedicated thread
    pub fn spawn(self, request: ExportRequest) -> std::io::Result<ExportTask> {
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name("ifc-slice-export".to_string())
            .spawn(move || self.run(&request))?;
        Ok(ExportTask { handle, cancel })
    }
}

/// Whether a filtered relation no longer points at any target
fn targets_nothing(relation: &DecodedEntity, kind: RelationKind) -> bool {
    match relation.get_named(kind.filterable_attribute()) {
        Ok(value) => {
            let mut refs = Vec::new();
            value.collect_refs(&mut refs);
            refs.is_empty()
        }
        Err(_) => true,
    }
}

/// What [`prune_grids`] took out of an output model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridPruning {
    /// Grids and grid axes
    pub grids: usize,
    /// Known relations left without a single target
    pub emptied_relations: usize,
    /// Placements, shapes and their parts nothing else referenced
    pub orphans: usize,
}

impl GridPruning {
    /// Entities removed because the grids went
    pub fn dependents(&self) -> usize {
        self.emptied_relations + self.orphans
    }
}

/// Remove every grid and grid axis along with what only they kept alive
///
/// Relations whose filterable attribute pointed at nothing but grids are
/// dropped. So are entities that only the grids referenced, transitively,
/// unless they are context entities.
pub fn prune_grids(output: &mut OutputModel) -> GridPruning {
    let mut pruning = GridPruning::default();
    let grids: Vec<EntityId> = [IfcType::IfcGridAxis, IfcType::IfcGrid]
        .iter()
        .flat_map(|ifc_type| output.by_type(ifc_type))
        .collect();
    let grid_sources: FxHashSet<EntityId> = grids
        .iter()
        .filter_map(|&id| output.get(id).map(|grid| grid.id))
        .collect();

    let grid_relations: Vec<(EntityId, RelationKind)> = output
        .iter()
        .filter_map(|(id, entity)| {
            let kind = RelationKind::of(&entity.ifc_type)?;
            let refs_grid = entity
                .references()
                .iter()
                .any(|target| grid_sources.contains(target));
            refs_grid.then_some((id, kind))
        })
        .collect();

    let mut released = Vec::new();
    for id in grids {
        if let Some(grid) = output.remove(id) {
            released.extend(grid.references());
            pruning.grids += 1;
        }
    }

    for (id, kind) in grid_relations {
        let emptied = output
            .get(id)
            .is_some_and(|relation| targets_nothing(relation, kind));
        if emptied && output.remove(id).is_some() {
            log::info!("Dropped {} {} that only related grids", kind.label(), id);
            pruning.emptied_relations += 1;
        }
    }

    let mut referrers = referrer_counts(output);
    while let Some(source) = released.pop() {
        if referrers.get(&source).is_some_and(|&count| count > 0) {
            continue;
        }
        let Some(id) = output.output_id(source) else {
            continue;
        };
        if output
            .get(id)
            .is_some_and(|entity| CONTEXT_TYPES.contains(&entity.ifc_type))
        {
            continue;
        }
        let Some(orphan) = output.remove(id) else {
            continue;
        };
        log::debug!("Dropped {} {} left unreferenced by grid removal", orphan.ifc_type, source);
        pruning.orphans += 1;
        for target in distinct_references(&orphan) {
            if let Some(count) = referrers.get_mut(&target) {
                *count = count.saturating_sub(1);
            }
            released.push(target);
        }
    }

    log::info!(
        "Removed {} grid entities and {} entities depending on them",
        pruning.grids,
        pruning.dependents()
    );
    pruning
}

fn distinct_references(entity: &DecodedEntity) -> Vec<EntityId> {
    let mut refs = entity.references();
    refs.sort_unstable();
    refs.dedup();
    refs
}

/// Source id to the number of output entities referencing it
fn referrer_counts(output: &OutputModel) -> FxHashMap<EntityId, usize> {
    let mut counts = FxHashMap::default();
    for (_, entity) in output.iter() {
        for target in distinct_references(entity) {
            *counts.entry(target).or_insert(0) += 1;
        }
    }
    counts
}

/// Handle to an export running in the background
pub struct ExportTask {
    handle: JoinHandle<Result<ExportResult>>,
    cancel: CancellationToken,
}

impl ExportTask {
    /// Ask the export to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the export to finish
    pub fn join(self) -> Result<ExportResult> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::{AttributeValue, EntityResolver};
    use ifc_slice_parser::ParsedModel;
    use std::sync::Mutex;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('site.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCOWNERHISTORY(#2,#6,$,.ADDED.,$,$,$,0);
#2=IFCPERSONANDORGANIZATION(#3,#4,$);
#3=IFCPERSON($,'Doe',$,$,$,$,$,$);
#4=IFCORGANIZATION($,'ACME',$,$,$);
#6=IFCAPPLICATION(#4,'1.0','Modeler','MOD');
#7=IFCPROJECT('p',#1,'Project',$,$,$,$,$,$);
#8=IFCSITE('si',#1,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#9=IFCBUILDING('bu',#1,'Building',$,$,$,$,$,.ELEMENT.,$,$,$);
#10=IFCELEMENTASSEMBLY('a',#1,'A1',$,$,$,$,$,$,$);
#11=IFCBEAM('b1',#1,'B1',$,$,#20,#61,$);
#12=IFCBEAM('b2',#1,'B2',$,$,#20,$,$);
#13=IFCRELAGGREGATES('r1',#1,$,$,#10,(#11,#12));
#14=IFCRELCONTAINEDINSPATIALSTRUCTURE('r2',#1,$,$,(#11,#12,#99),#15);
#15=IFCBUILDINGSTOREY('st',#1,'Level 1',$,$,$,$,$,.ELEMENT.,0.);
#16=IFCRELAGGREGATES('ag1',#1,$,$,#7,(#8));
#17=IFCRELAGGREGATES('ag2',#1,$,$,#8,(#9));
#18=IFCRELAGGREGATES('ag3',#1,$,$,#9,(#15));
#19=IFCRELDECLARES('de',#1,$,$,#7,(#40));
#20=IFCLOCALPLACEMENT($,#21);
#21=IFCAXIS2PLACEMENT3D(#22,$,$);
#22=IFCCARTESIANPOINT((0.,0.,0.));
#30=IFCGRID('g',#1,'Grid',$,$,#20,#33,(#31),(#32),$,$);
#31=IFCGRIDAXIS('A',#34,.T.);
#32=IFCGRIDAXIS('1',#35,.T.);
#33=IFCPRODUCTDEFINITIONSHAPE($,$,(#36));
#34=IFCPOLYLINE((#22,#37));
#35=IFCPOLYLINE((#22,#37));
#36=IFCSHAPEREPRESENTATION($,'FootPrint','GeometricCurveSet',(#38));
#37=IFCCARTESIANPOINT((1.,0.,0.));
#38=IFCGEOMETRICCURVESET((#34,#35));
#39=IFCPRESENTATIONLAYERASSIGNMENT('Grids',$,(#38),$);
#40=IFCMATERIAL('S355',$,$);
#61=IFCPRODUCTDEFINITIONSHAPE($,$,(#62));
#62=IFCSHAPEREPRESENTATION($,'Body','Brep',(#63));
#63=IFCFACETEDBREP($);
#99=IFCCOLUMN('c',#1,'C1',$,$,#20,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    fn pipeline() -> ExportPipeline {
        let model: Arc<dyn IfcModel> = Arc::new(ParsedModel::parse(TEST_IFC).unwrap());
        ExportPipeline::new(model)
    }

    fn assembly_request(identity: IdentityPolicy) -> ExportRequest {
        ExportRequest::new(ExportKind::Assemblies, vec![EntityId(10)], "unused.ifc")
            .with_identity(identity)
    }

    #[test]
    fn test_assembly_export_with_context() {
        let built = pipeline()
            .build(&assembly_request(IdentityPolicy::PreserveIds))
            .unwrap();
        let out = &built.output;

        for id in [1, 2, 3, 4, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 20, 21, 22, 61, 62, 63] {
            assert_eq!(out.output_id(EntityId(id)), Some(EntityId(id)), "missing #{id}");
        }
        // Unselected column and the undeclared material stay out
        for id in [99, 19, 40, 30] {
            assert!(!out.contains_source(EntityId(id)), "unexpected #{id}");
        }

        let containment = out.get(EntityId(14)).unwrap();
        assert_eq!(containment.get_refs(4), Some(vec![EntityId(11), EntityId(12)]));
        assert!(ReferenceIntegrityChecker::unresolved(out).is_empty());
        assert!(built.healed.is_empty());
        assert!(built.report.is_trustworthy());
    }

    #[test]
    fn test_grids_pruned_unless_requested() {
        let request = ExportRequest::new(ExportKind::Phases, vec![EntityId(39)], "unused.ifc");

        let pruned = pipeline().build(&request).unwrap();
        assert_eq!(pruned.closure.members, vec![EntityId(30)]);
        assert_eq!(pruned.report.grids_removed, 3);
        assert!(pruned.output.by_type(&IfcType::IfcGrid).is_empty());
        assert!(pruned.output.by_type(&IfcType::IfcGridAxis).is_empty());
        assert!(pruned.output.dangling_references().is_empty());

        let kept = pipeline().build(&request.with_grids(true)).unwrap();
        assert_eq!(kept.report.grids_removed, 0);
        assert_eq!(kept.output.by_type(&IfcType::IfcGrid).len(), 1);
        assert_eq!(kept.output.by_type(&IfcType::IfcGridAxis).len(), 2);
    }

    #[test]
    fn test_new_ids_are_reproducible_and_independent() {
        let pipeline = pipeline();
        let first = pipeline.build(&assembly_request(IdentityPolicy::NewIds)).unwrap();
        let second = pipeline.build(&assembly_request(IdentityPolicy::NewIds)).unwrap();

        assert_eq!(first.output.len(), second.output.len());
        for id in first.output.ids() {
            assert_eq!(first.output.resolved(id), second.output.resolved(id));
        }
        assert_ne!(first.output.output_id(EntityId(10)), Some(EntityId(10)));

        // Same content as the identifier-preserving export
        let preserved = pipeline
            .build(&assembly_request(IdentityPolicy::PreserveIds))
            .unwrap();
        assert_eq!(preserved.output.len(), first.output.len());
        let beam = first.output.get_by_source(EntityId(11)).unwrap();
        assert_eq!(beam.attributes, preserved.output.get(EntityId(11)).unwrap().attributes);
    }

    #[test]
    fn test_preserve_ids_are_stable_across_runs() {
        let pipeline = pipeline();
        for _ in 0..2 {
            let built = pipeline
                .build(&assembly_request(IdentityPolicy::PreserveIds))
                .unwrap();
            assert_eq!(built.output.output_id(EntityId(12)), Some(EntityId(12)));
        }
    }

    #[test]
    fn test_run_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1.ifc");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let request = assembly_request(IdentityPolicy::NewIds).with_schema(SchemaVersion::Ifc2x3);
        let request = ExportRequest {
            destination: path.clone(),
            ..request
        };
        let result = pipeline()
            .with_progress(Box::new(move |phase, _| sink.lock().unwrap().push(phase.to_string())))
            .run(&request)
            .unwrap();

        assert_eq!(result.path, path);
        assert_eq!(result.report.dangling_written, 0);

        let written = ParsedModel::open(&path).unwrap();
        assert_eq!(written.metadata().schema_version, "IFC2X3");
        assert_eq!(written.resolver().entity_count(), result.entities_written);
        assert_eq!(written.resolver().find_by_type_name("IfcBeam").len(), 2);
        assert!(written.resolver().find_by_type_name("IfcColumn").is_empty());

        let phases = seen.lock().unwrap();
        assert_eq!(phases.first().map(String::as_str), Some("Resolving roots"));
        assert_eq!(phases.last().map(String::as_str), Some("Complete"));
    }

    #[test]
    fn test_unknown_root_and_empty_request() {
        let request = ExportRequest::new(ExportKind::Assemblies, vec![EntityId(404)], "x.ifc");
        assert!(matches!(
            pipeline().build(&request),
            Err(ExportError::EntityNotFound(EntityId(404)))
        ));

        let request = ExportRequest::new(ExportKind::Phases, vec![], "x.ifc");
        assert!(matches!(pipeline().build(&request), Err(ExportError::NoPhasesFound)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let pipeline = pipeline();
        pipeline.cancellation().cancel();
        assert!(matches!(
            pipeline.build(&assembly_request(IdentityPolicy::PreserveIds)),
            Err(ExportError::Cancelled)
        ));
    }

    #[test]
    fn test_spawned_export() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExportRequest {
            destination: dir.path().join("bg.ifc"),
            ..assembly_request(IdentityPolicy::PreserveIds)
        };
        let task = pipeline().spawn(request).unwrap();
        let result = task.join().unwrap();
        assert!(result.entities_written > 0);
        assert!(result.path.exists());
    }

    #[test]
    fn test_prune_grids_drops_emptied_relations_and_orphans() {
        use AttributeValue::{List, Null};
        let r = |id: u64| AttributeValue::EntityRef(EntityId(id));
        let name = || AttributeValue::String("x".into());
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        let entities = [
            (1, IfcType::IfcOwnerHistory, vec![Null]),
            (5, IfcType::IfcBuildingStorey, vec![name(), r(1), Null, Null, Null, r(20)]),
            (20, IfcType::IfcLocalPlacement, vec![Null, r(21)]),
            (21, IfcType::IfcAxis2Placement3D, vec![r(22), Null, Null]),
            (22, IfcType::IfcCartesianPoint, vec![List(vec![])]),
            (24, IfcType::IfcLocalPlacement, vec![r(20), r(25)]),
            (25, IfcType::IfcAxis2Placement3D, vec![r(22), Null, Null]),
            (
                30,
                IfcType::IfcGrid,
                vec![name(), r(1), Null, Null, Null, r(24), Null, List(vec![r(31)]), List(vec![r(32)])],
            ),
            (31, IfcType::IfcGridAxis, vec![name(), Null, Null]),
            (32, IfcType::IfcGridAxis, vec![name(), Null, Null]),
            (
                33,
                IfcType::IfcRelContainedInSpatialStructure,
                vec![name(), r(1), Null, Null, List(vec![r(30)]), r(5)],
            ),
            (
                34,
                IfcType::IfcRelContainedInSpatialStructure,
                vec![name(), r(1), Null, Null, List(vec![r(30), r(40)]), r(5)],
            ),
            (40, IfcType::IfcBeam, vec![name(), r(1), Null, Null, Null, r(20)]),
        ];
        for (id, ifc_type, attributes) in entities {
            out.add(&DecodedEntity::new(EntityId(id), ifc_type, attributes)).unwrap();
        }

        let pruning = prune_grids(&mut out);
        assert_eq!(
            pruning,
            GridPruning {
                grids: 3,
                emptied_relations: 1,
                orphans: 2,
            }
        );
        assert_eq!(
            out.ids(),
            [1, 5, 20, 21, 22, 34, 40].map(EntityId).to_vec()
        );
        // A relation keeping another target survives without the grid
        assert_eq!(out.get(EntityId(34)).unwrap().get_refs(4), Some(vec![EntityId(40)]));
        assert!(out.dangling_references().is_empty());
    }

    #[test]
    fn test_prune_grids_keeps_context_entities() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        out.add(&DecodedEntity::new(EntityId(7), IfcType::IfcProject, vec![]))
            .unwrap();
        out.add(&DecodedEntity::new(
            EntityId(30),
            IfcType::IfcGrid,
            vec![AttributeValue::EntityRef(EntityId(7))],
        ))
        .unwrap();

        assert_eq!(prune_grids(&mut out).dependents(), 0);
        assert_eq!(out.ids(), vec![EntityId(7)]);
    }
}
