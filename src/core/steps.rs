//! Step collection with scope/beneficiary partitioning
//!
//! Steps live in one flat vector kept in insertion order. Partitions are
//! derived on demand by grouping on (scope, beneficiary type); a step's
//! `order_index` only has meaning relative to the other members of its
//! partition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{
    BeneficiaryType, Bilingual, PartitionKey, Step, StepImage, StepScope, MAX_IMAGES_PER_STEP,
};
use super::error::{EditorError, InvariantViolation};

/// Direction for a single-position move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Partial update for a step
///
/// Only title, body and images are mutable. Setting `id`, `scope` or
/// `beneficiary_type` to a value different from the step's current one is
/// rejected.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    pub id: Option<String>,
    pub scope: Option<StepScope>,
    pub beneficiary_type: Option<Option<BeneficiaryType>>,
    pub title: Option<Bilingual>,
    pub body: Option<Bilingual>,
    pub images: Option<Vec<StepImage>>,
}

impl StepPatch {
    pub fn title(title: Bilingual) -> Self {
        Self {
            title: Some(title),
            ..Self::default()
        }
    }

    pub fn body(body: Bilingual) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn images(images: Vec<StepImage>) -> Self {
        Self {
            images: Some(images),
            ..Self::default()
        }
    }
}

/// Owns the ordered step collection of a manual
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Step>", into = "Vec<Step>")]
pub struct StepRepository {
    steps: Vec<Step>,
}

impl TryFrom<Vec<Step>> for StepRepository {
    type Error = InvariantViolation;

    fn try_from(steps: Vec<Step>) -> Result<Self, Self::Error> {
        for step in &steps {
            step.check_invariants()?;
        }
        Ok(Self { steps })
    }
}

impl From<StepRepository> for Vec<Step> {
    fn from(repo: StepRepository) -> Self {
        repo.steps
    }
}

impl StepRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Append a new empty step at the end of its partition
    pub fn add_step(
        &mut self,
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
    ) -> Result<Step, EditorError> {
        let key = PartitionKey::new(scope, beneficiary_type)?;
        // Partition size, unless deletions left gaps that would sort the new
        // step ahead of existing members.
        let members = self.steps.iter().filter(|s| s.partition() == key);
        let order_index = members
            .map(|s| s.order_index + 1)
            .max()
            .unwrap_or(0)
            .max(self.partition_positions(key).len() as u32);

        let step = Step {
            id: Uuid::new_v4().to_string(),
            scope,
            beneficiary_type,
            title: Bilingual::default(),
            body: Bilingual::default(),
            order_index,
            images: Vec::new(),
        };
        tracing::debug!(
            "Added step {} to {:?}/{:?} at {}",
            step.id,
            scope,
            beneficiary_type,
            order_index
        );
        self.steps.push(step.clone());
        Ok(step)
    }

    /// Merge title, body and image changes into a step
    pub fn update_step(&mut self, id: &str, patch: StepPatch) -> Result<&Step, EditorError> {
        let step = self
            .get(id)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))?;

        if patch.id.as_deref().is_some_and(|new_id| new_id != step.id) {
            return Err(InvariantViolation::ImmutableField("id").into());
        }
        if patch.scope.is_some_and(|scope| scope != step.scope) {
            return Err(InvariantViolation::ImmutableField("scope").into());
        }
        if patch
            .beneficiary_type
            .is_some_and(|beneficiary| beneficiary != step.beneficiary_type)
        {
            return Err(InvariantViolation::ImmutableField("beneficiaryType").into());
        }
        if let Some(images) = &patch.images {
            if images.len() > MAX_IMAGES_PER_STEP {
                return Err(InvariantViolation::TooManyImages {
                    count: images.len(),
                    max: MAX_IMAGES_PER_STEP,
                }
                .into());
            }
        }

        let step = self
            .get_mut(id)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            step.title = title;
        }
        if let Some(body) = patch.body {
            step.body = body;
        }
        if let Some(images) = patch.images {
            step.images = images;
        }
        Ok(step)
    }

    /// Remove a step; remaining order indices are left as they are
    pub fn delete_step(&mut self, id: &str) -> Result<Step, EditorError> {
        let pos = self
            .steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))?;
        let removed = self.steps.remove(pos);
        tracing::debug!("Deleted step {}", removed.id);
        Ok(removed)
    }

    /// Swap a step with its neighbour inside its own partition
    ///
    /// Returns `false` when the step is already at the requested edge.
    pub fn move_step(&mut self, id: &str, direction: MoveDirection) -> Result<bool, EditorError> {
        let key = self
            .get(id)
            .map(Step::partition)
            .ok_or_else(|| EditorError::StepNotFound(id.to_string()))?;

        let members = self.partition_positions(key);
        let Some(rank) = members.iter().position(|&pos| self.steps[pos].id == id) else {
            return Err(EditorError::StepNotFound(id.to_string()));
        };
        let neighbour = match direction {
            MoveDirection::Up if rank == 0 => return Ok(false),
            MoveDirection::Down if rank + 1 == members.len() => return Ok(false),
            MoveDirection::Up => rank - 1,
            MoveDirection::Down => rank + 1,
        };

        // Compact first so tied indices cannot turn the swap into a no-op.
        for (index, &pos) in members.iter().enumerate() {
            self.steps[pos].order_index = index as u32;
        }
        self.steps[members[rank]].order_index = neighbour as u32;
        self.steps[members[neighbour]].order_index = rank as u32;

        tracing::debug!("Moved step {} {:?} within {:?}", id, direction, key);
        Ok(true)
    }

    /// Reassign a partition's order from an explicit list of its step ids
    pub fn reorder_partition(
        &mut self,
        scope: StepScope,
        beneficiary_type: Option<BeneficiaryType>,
        ordered_ids: &[String],
    ) -> Result<(), EditorError> {
        let key = PartitionKey::new(scope, beneficiary_type)?;
        let members = self.partition_positions(key);

        let mut assigned = Vec::with_capacity(members.len());
        for &pos in &members {
            let id = &self.steps[pos].id;
            let index = ordered_ids
                .iter()
                .position(|candidate| candidate == id)
                .ok_or(InvariantViolation::NotAPermutation)?;
            assigned.push((pos, index));
        }
        if ordered_ids.len() != members.len() {
            return Err(InvariantViolation::NotAPermutation.into());
        }

        for (pos, index) in assigned {
            self.steps[pos].order_index = index as u32;
        }
        Ok(())
    }

    /// Steps of one partition in their relative order
    pub fn partition(&self, key: PartitionKey) -> Vec<&Step> {
        self.partition_positions(key)
            .into_iter()
            .map(|pos| &self.steps[pos])
            .collect()
    }

    /// Vector positions of a partition's members, sorted by order index with
    /// ties broken by insertion order
    fn partition_positions(&self, key: PartitionKey) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.partition() == key)
            .map(|(pos, _)| pos)
            .collect();
        positions.sort_by_key(|&pos| (self.steps[pos].order_index, pos));
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(steps: Vec<&Step>) -> Vec<String> {
        steps.into_iter().map(|s| s.id.clone()).collect()
    }

    fn titled(repo: &mut StepRepository, key: PartitionKey, title: &str) -> String {
        let step = repo.add_step(key.scope, key.beneficiary_type).unwrap();
        repo.update_step(&step.id, StepPatch::title(Bilingual::new(title, title)))
            .unwrap();
        step.id
    }

    #[test]
    fn test_add_step_rejects_beneficiary_scope_without_type() {
        let mut repo = StepRepository::new();
        let err = repo.add_step(StepScope::Beneficiary, None).unwrap_err();
        assert!(matches!(
            err,
            EditorError::InvalidArgument(InvariantViolation::MissingBeneficiaryType)
        ));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_add_step_appends_to_partition() {
        let mut repo = StepRepository::new();
        let s0 = repo.add_step(StepScope::Shared, None).unwrap();
        let b0 = repo
            .add_step(StepScope::Beneficiary, Some(BeneficiaryType::Business))
            .unwrap();
        let s1 = repo.add_step(StepScope::Shared, None).unwrap();

        assert_eq!(s0.order_index, 0);
        assert_eq!(b0.order_index, 0);
        assert_eq!(s1.order_index, 1);
        assert!(s1.title.ar.is_empty() && s1.images.is_empty());
    }

    #[test]
    fn test_update_step_rejects_rescoping() {
        let mut repo = StepRepository::new();
        let step = repo.add_step(StepScope::Shared, None).unwrap();

        let patch = StepPatch {
            scope: Some(StepScope::Beneficiary),
            beneficiary_type: Some(Some(BeneficiaryType::Individual)),
            title: Some(Bilingual::new("x", "x")),
            ..StepPatch::default()
        };
        let err = repo.update_step(&step.id, patch).unwrap_err();
        assert!(matches!(
            err,
            EditorError::InvalidArgument(InvariantViolation::ImmutableField("scope"))
        ));

        let stored = repo.get(&step.id).unwrap();
        assert_eq!(stored.scope, StepScope::Shared);
        assert!(stored.beneficiary_type.is_none());
        assert!(stored.title.en.is_empty());
    }

    #[test]
    fn test_update_step_accepts_unchanged_identity_fields() {
        let mut repo = StepRepository::new();
        let step = repo
            .add_step(StepScope::Beneficiary, Some(BeneficiaryType::Individual))
            .unwrap();
        let patch = StepPatch {
            id: Some(step.id.clone()),
            beneficiary_type: Some(Some(BeneficiaryType::Individual)),
            body: Some(Bilingual::new("نص", "Body")),
            ..StepPatch::default()
        };
        let updated = repo.update_step(&step.id, patch).unwrap();
        assert_eq!(updated.body.en, "Body");
    }

    #[test]
    fn test_delete_keeps_relative_order_with_gaps() {
        let mut repo = StepRepository::new();
        let key = PartitionKey::shared();
        let a = titled(&mut repo, key, "a");
        let b = titled(&mut repo, key, "b");
        let c = titled(&mut repo, key, "c");

        repo.delete_step(&b).unwrap();
        assert_eq!(ids(repo.partition(key)), vec![a.clone(), c.clone()]);

        // A new step still lands after the survivors.
        let d = titled(&mut repo, key, "d");
        assert_eq!(ids(repo.partition(key)), vec![a, c, d]);
    }

    #[test]
    fn test_add_after_leading_deletes_still_appends() {
        let mut repo = StepRepository::new();
        let key = PartitionKey::shared();
        let a = titled(&mut repo, key, "a");
        let b = titled(&mut repo, key, "b");
        let c = titled(&mut repo, key, "c");
        let d = titled(&mut repo, key, "d");
        repo.delete_step(&a).unwrap();
        repo.delete_step(&b).unwrap();

        let e = titled(&mut repo, key, "e");
        assert_eq!(ids(repo.partition(key)), vec![c, d, e]);
    }

    #[test]
    fn test_move_at_partition_edges_is_noop() {
        let mut repo = StepRepository::new();
        let key = PartitionKey::beneficiary(BeneficiaryType::Business);
        let first = titled(&mut repo, key, "b1");
        let last = titled(&mut repo, key, "b2");
        let before = repo.clone();

        assert!(!repo.move_step(&first, MoveDirection::Up).unwrap());
        assert!(!repo.move_step(&last, MoveDirection::Down).unwrap());
        assert_eq!(repo, before);
    }

    #[test]
    fn test_move_is_local_to_partition() {
        let mut repo = StepRepository::new();
        let shared = PartitionKey::shared();
        let business = PartitionKey::beneficiary(BeneficiaryType::Business);
        let individual = PartitionKey::beneficiary(BeneficiaryType::Individual);

        let s1 = titled(&mut repo, shared, "s1");
        let b1 = titled(&mut repo, business, "b1");
        let s2 = titled(&mut repo, shared, "s2");
        let i1 = titled(&mut repo, individual, "i1");
        let b2 = titled(&mut repo, business, "b2");
        let s3 = titled(&mut repo, shared, "s3");

        let business_before = ids(repo.partition(business));
        let individual_before = ids(repo.partition(individual));

        assert!(repo.move_step(&s3, MoveDirection::Up).unwrap());
        assert_eq!(ids(repo.partition(shared)), vec![s1.clone(), s3.clone(), s2.clone()]);
        assert!(repo.move_step(&s1, MoveDirection::Down).unwrap());
        assert_eq!(ids(repo.partition(shared)), vec![s3, s1, s2]);

        assert_eq!(ids(repo.partition(business)), business_before);
        assert_eq!(ids(repo.partition(individual)), individual_before);
        assert_eq!(business_before, vec![b1, b2]);
        assert_eq!(individual_before, vec![i1]);
    }

    #[test]
    fn test_move_with_tied_indices_breaks_ties_by_insertion() {
        let steps: Vec<Step> = ["x", "y"]
            .iter()
            .map(|id| Step {
                id: id.to_string(),
                scope: StepScope::Shared,
                beneficiary_type: None,
                title: Bilingual::default(),
                body: Bilingual::default(),
                order_index: 3,
                images: Vec::new(),
            })
            .collect();
        let mut repo = StepRepository::try_from(steps).unwrap();
        let key = PartitionKey::shared();
        assert_eq!(ids(repo.partition(key)), vec!["x", "y"]);

        assert!(repo.move_step("y", MoveDirection::Up).unwrap());
        assert_eq!(ids(repo.partition(key)), vec!["y", "x"]);
    }

    #[test]
    fn test_reorder_partition_requires_permutation() {
        let mut repo = StepRepository::new();
        let key = PartitionKey::beneficiary(BeneficiaryType::Individual);
        let a = titled(&mut repo, key, "a");
        let b = titled(&mut repo, key, "b");
        let shared = titled(&mut repo, PartitionKey::shared(), "s");

        let err = repo
            .reorder_partition(key.scope, key.beneficiary_type, &[b.clone(), shared])
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::InvalidArgument(InvariantViolation::NotAPermutation)
        ));
        assert_eq!(ids(repo.partition(key)), vec![a.clone(), b.clone()]);

        repo.reorder_partition(key.scope, key.beneficiary_type, &[b.clone(), a.clone()])
            .unwrap();
        assert_eq!(ids(repo.partition(key)), vec![b, a]);
    }

    #[test]
    fn test_deserialize_rejects_scope_invariant_violation() {
        let json = r#"[{"id":"1","scope":"BENEFICIARY","beneficiaryType":null,"orderIndex":0}]"#;
        assert!(serde_json::from_str::<StepRepository>(json).is_err());

        let json = r#"[{"id":"1","scope":"SHARED","beneficiaryType":null,"orderIndex":0}]"#;
        let repo: StepRepository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.len(), 1);
    }
}
