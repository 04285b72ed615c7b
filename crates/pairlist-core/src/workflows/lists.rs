use std::collections::HashMap;

use slotmap::SlotMap;
use tracing::{debug, info};

use crate::core::models::domain::Domain;
use crate::core::models::ids::ListId;
use crate::core::models::particle::ParticleSet;
use crate::engine::bin_grid::{BinGrid, GridKey};
use crate::engine::config::BuildCadence;
use crate::engine::error::NeighborError;
use crate::engine::pair_list::{ListRequest, NeighborList};
use crate::engine::scheduler::{ListState, RebuildScheduler};
use crate::engine::stencil::Stencil;

/// Owns every registered neighbor list and the bin grids they share.
///
/// Consumers register a [`ListRequest`] once and get back a stable [`ListId`];
/// the driver then calls [`NeighborHub::update`] once per timestep with the
/// current positions. Lists whose cadence is every-step are rebuilt eagerly
/// inside the update when stale; occasional lists are only marked and rebuilt
/// on first access through [`NeighborHub::ensure_built`].
///
/// Grids are keyed by geometry (domain shape, extended cutoff, bin sizing), so
/// lists with matching keys bin the particle set once per step instead of once
/// per list. Grids whose geometry no longer matches any registered list are
/// dropped at the end of each update.
#[derive(Debug, Default)]
pub struct NeighborHub {
    lists: SlotMap<ListId, ManagedList>,
    grids: HashMap<GridKey, GridSlot>,
    step: u64,
}

#[derive(Debug)]
struct ManagedList {
    request: ListRequest,
    /// Largest pair cutoff plus skin; sizes the bins and the ghost halo.
    cutneigh: f64,
    list: NeighborList,
    scheduler: RebuildScheduler,
    stencil: Option<(GridKey, Stencil)>,
}

#[derive(Debug)]
struct GridSlot {
    grid: BinGrid,
    /// Step of the last `assign`, so shared grids bin at most once per step.
    stamp: Option<u64>,
}

impl NeighborHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a list request and returns its handle.
    ///
    /// The configuration is validated here; a rejected request leaves the hub
    /// and every other list untouched.
    pub fn request(&mut self, request: ListRequest) -> Result<ListId, NeighborError> {
        request.config.validate()?;
        let cutneigh = request.cutoffs.max() + request.config.skin;
        let scheduler = RebuildScheduler::new(request.config.skin);
        let list = NeighborList::new(request.config.page_size);
        let id = self.lists.insert(ManagedList {
            request,
            cutneigh,
            list,
            scheduler,
            stencil: None,
        });
        info!(lists = self.lists.len(), "Registered neighbor list");
        Ok(id)
    }

    /// Removes a list; its handle becomes invalid.
    pub fn release(&mut self, id: ListId) -> Result<(), NeighborError> {
        self.lists
            .remove(id)
            .map(|_| ())
            .ok_or(NeighborError::UnknownList)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// How many distinct bin-grid geometries the registered lists currently
    /// occupy.
    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    /// Per-step entry point: checks every list for staleness and eagerly
    /// rebuilds the every-step ones.
    ///
    /// `particles` must hold the positions for this step, ghosts included;
    /// occasional lists are only marked here and rebuilt by the first
    /// [`NeighborHub::ensure_built`] that reaches them.
    pub fn update(
        &mut self,
        particles: &ParticleSet,
        domain: &Domain,
    ) -> Result<(), NeighborError> {
        self.step += 1;
        let step = self.step;
        let Self { lists, grids, .. } = self;

        let mut live_keys: Vec<GridKey> = Vec::with_capacity(lists.len());
        for (_, managed) in lists.iter_mut() {
            let key = GridKey::new(domain, &managed.request.config, managed.cutneigh);
            live_keys.push(key);

            let cadence = managed.request.config.cadence;
            let state = managed.scheduler.check(particles, key, cadence);
            if cadence == BuildCadence::EveryStep && state != ListState::Valid {
                // Positions are fixed for the duration of one update call, so
                // a shared grid already stamped this step needs no re-bin.
                let slot = grid_for(grids, key, domain, managed, particles, step, false)?;
                rebuild(managed, slot, particles, key)?;
            }
        }

        grids.retain(|key, _| live_keys.contains(key));
        debug!(step, grids = grids.len(), "Neighbor update complete");
        Ok(())
    }

    /// Rebuilds the list behind `id` if it is fresh or invalidated, then
    /// returns it. Valid lists are returned as-is; this is how occasional
    /// consumers realize their lazy rebuilds.
    pub fn ensure_built(
        &mut self,
        id: ListId,
        particles: &ParticleSet,
        domain: &Domain,
    ) -> Result<&NeighborList, NeighborError> {
        let step = self.step;
        let Self { lists, grids, .. } = self;
        let managed = lists.get_mut(id).ok_or(NeighborError::UnknownList)?;

        let key = GridKey::new(domain, &managed.request.config, managed.cutneigh);
        let cadence = managed.request.config.cadence;
        if managed.scheduler.check(particles, key, cadence) != ListState::Valid {
            // The caller may have moved particles after this step's update
            // already binned the shared grid; the step stamp alone cannot see
            // that, so force a re-bin whenever the set has drifted.
            let moved = managed.scheduler.drifted(particles);
            let slot = grid_for(grids, key, domain, managed, particles, step, moved)?;
            rebuild(managed, slot, particles, key)?;
        }
        Ok(&managed.list)
    }

    /// The most recently built rows of list `id`.
    pub fn list(&self, id: ListId) -> Result<&NeighborList, NeighborError> {
        self.lists
            .get(id)
            .map(|m| &m.list)
            .ok_or(NeighborError::UnknownList)
    }

    pub fn state(&self, id: ListId) -> Result<ListState, NeighborError> {
        self.lists
            .get(id)
            .map(|m| m.scheduler.state())
            .ok_or(NeighborError::UnknownList)
    }

    /// Forces every list stale, e.g. after the driver edited exclusion
    /// tables or cutoffs in place.
    pub fn invalidate_all(&mut self) {
        for (_, managed) in self.lists.iter_mut() {
            managed.scheduler.mark_stale(managed.request.config.cadence);
        }
    }
}

/// Fetches the shared grid for `key`, creating it on first sight and binning
/// the particles at most once per step.
fn grid_for<'a>(
    grids: &'a mut HashMap<GridKey, GridSlot>,
    key: GridKey,
    domain: &Domain,
    managed: &ManagedList,
    particles: &ParticleSet,
    step: u64,
    force_assign: bool,
) -> Result<&'a mut GridSlot, NeighborError> {
    let slot = grids.entry(key).or_insert_with(|| GridSlot {
        grid: BinGrid::new(domain, &managed.request.config, managed.cutneigh),
        stamp: None,
    });
    if force_assign || slot.stamp != Some(step) {
        slot.grid.assign(particles, domain)?;
        slot.stamp = Some(step);
    }
    Ok(slot)
}

fn rebuild(
    managed: &mut ManagedList,
    slot: &GridSlot,
    particles: &ParticleSet,
    key: GridKey,
) -> Result<(), NeighborError> {
    // Stencils depend only on grid geometry and cutoffs; reuse until the key
    // changes.
    if !matches!(&managed.stencil, Some((k, _)) if *k == key) {
        let inflated = managed.request.cutoffs.inflated(managed.request.config.skin);
        let stencil = Stencil::build(&slot.grid, &managed.request.config, &inflated)?;
        managed.stencil = Some((key, stencil));
    }
    let Some((_, stencil)) = &managed.stencil else {
        return Err(NeighborError::Internal(
            "stencil missing after build".into(),
        ));
    };

    managed
        .list
        .rebuild(particles, &slot.grid, stencil, &managed.request)?;
    managed.scheduler.note_built(particles, key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{NeighborConfig, NeighborConfigBuilder, Symmetry};
    use nalgebra::Point3;

    fn domain_10() -> Domain {
        Domain::orthogonal(Point3::origin(), Point3::new(10.0, 10.0, 10.0)).unwrap()
    }

    fn config(symmetry: Symmetry) -> NeighborConfigBuilder {
        NeighborConfig::builder().cutoff(1.5).skin(0.3).symmetry(symmetry)
    }

    fn pair_particles() -> ParticleSet {
        ParticleSet::from_positions(vec![
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(6.0, 5.0, 5.0),
        ])
    }

    #[test]
    fn update_builds_registered_lists() {
        let domain = domain_10();
        let particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();

        assert_eq!(hub.state(id).unwrap(), ListState::Fresh);
        hub.update(&particles, &domain).unwrap();

        assert_eq!(hub.state(id).unwrap(), ListState::Valid);
        let list = hub.list(id).unwrap();
        assert_eq!(list.indices(0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(list.count(1), 0);
    }

    #[test]
    fn invalid_request_is_rejected_and_leaves_the_hub_intact() {
        let mut hub = NeighborHub::new();
        let bad = NeighborConfig {
            include_ghosts: true,
            ..config(Symmetry::Half).build().unwrap()
        };
        let err = hub.request(ListRequest::simple(bad)).unwrap_err();
        assert!(matches!(err, NeighborError::Config { .. }));
        assert!(hub.is_empty());
    }

    #[test]
    fn sub_skin_motion_reuses_the_cached_list() {
        let domain = domain_10();
        let mut particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();

        // Displacement under skin/2: the cached list is served untouched.
        particles.positions[1].x += 0.1;
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::Valid);
        assert_eq!(hub.list(id).unwrap().indices(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn motion_past_half_skin_triggers_an_eager_rebuild() {
        // Scenario C, every-step cadence: the displaced particle drifts out of
        // reach and the very next update drops the pair.
        let domain = domain_10();
        let mut particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.list(id).unwrap().total_pairs(), 1);

        particles.positions[1].x += 2.0;
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::Valid);
        assert_eq!(hub.list(id).unwrap().total_pairs(), 0);
    }

    #[test]
    fn occasional_lists_rebuild_lazily_on_access() {
        let domain = domain_10();
        let mut particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(
                config(Symmetry::Half)
                    .cadence(BuildCadence::Occasional)
                    .build()
                    .unwrap(),
            ))
            .unwrap();

        // Never built eagerly.
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::Fresh);

        let list = hub.ensure_built(id, &particles, &domain).unwrap();
        assert_eq!(list.total_pairs(), 1);
        assert_eq!(hub.state(id).unwrap(), ListState::Valid);

        // Invalidation marks on-demand instead of rebuilding in update.
        particles.positions[1].x += 2.0;
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::OnDemand);
        assert_eq!(hub.list(id).unwrap().total_pairs(), 1, "not rebuilt yet");

        let list = hub.ensure_built(id, &particles, &domain).unwrap();
        assert_eq!(list.total_pairs(), 0);
    }

    #[test]
    fn ensure_built_rebins_after_motion_within_one_step() {
        // The shared grid was already binned by this step's update; motion
        // between that update and a lazy access must still be re-binned, or
        // the rebuild would scan stale bin coordinates and miss the pair.
        let domain = domain_10();
        let mut particles = ParticleSet::from_positions(vec![
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(9.0, 5.0, 5.0),
        ]);
        let mut hub = NeighborHub::new();
        hub.request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        let lazy = hub
            .request(ListRequest::simple(
                config(Symmetry::Half)
                    .cadence(BuildCadence::Occasional)
                    .build()
                    .unwrap(),
            ))
            .unwrap();

        hub.update(&particles, &domain).unwrap();
        let list = hub.ensure_built(lazy, &particles, &domain).unwrap();
        assert_eq!(list.total_pairs(), 0);

        particles.positions[1].x = 6.0;
        let list = hub.ensure_built(lazy, &particles, &domain).unwrap();
        assert_eq!(list.total_pairs(), 1);
        assert_eq!(list.indices(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn lists_with_matching_geometry_share_one_grid() {
        let domain = domain_10();
        let particles = pair_particles();
        let mut hub = NeighborHub::new();
        hub.request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.request(ListRequest::simple(config(Symmetry::Full).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.grid_count(), 1);

        // A different cutoff means a different geometry.
        hub.request(ListRequest::simple(
            NeighborConfig::builder()
                .cutoff(3.0)
                .skin(0.3)
                .symmetry(Symmetry::Full)
                .build()
                .unwrap(),
        ))
        .unwrap();
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.grid_count(), 2);
    }

    #[test]
    fn box_resize_invalidates_and_rebuilds() {
        let domain = domain_10();
        let particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();

        let grown =
            Domain::orthogonal(Point3::origin(), Point3::new(14.0, 10.0, 10.0)).unwrap();
        hub.update(&particles, &grown).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::Valid);
        assert_eq!(hub.list(id).unwrap().total_pairs(), 1);
        // The old geometry's grid is gone.
        assert_eq!(hub.grid_count(), 1);
    }

    #[test]
    fn released_handles_report_unknown_list() {
        let domain = domain_10();
        let particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();

        hub.release(id).unwrap();
        assert!(matches!(hub.list(id), Err(NeighborError::UnknownList)));
        assert!(matches!(
            hub.ensure_built(id, &particles, &domain),
            Err(NeighborError::UnknownList)
        ));
        assert!(matches!(hub.release(id), Err(NeighborError::UnknownList)));
    }

    #[test]
    fn invalidate_all_forces_the_next_rebuild() {
        let domain = domain_10();
        let particles = pair_particles();
        let mut hub = NeighborHub::new();
        let id = hub
            .request(ListRequest::simple(config(Symmetry::Half).build().unwrap()))
            .unwrap();
        hub.update(&particles, &domain).unwrap();

        hub.invalidate_all();
        assert_eq!(hub.state(id).unwrap(), ListState::Stale);
        hub.update(&particles, &domain).unwrap();
        assert_eq!(hub.state(id).unwrap(), ListState::Valid);
    }
}
