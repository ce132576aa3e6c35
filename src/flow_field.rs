use crate::grid::{Cell, GridMap, GridMetrics, NEIGHBOR_STEPS};
use crate::pathfinding::{step_cost, walkable_cells};
use glam::DVec2;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

/// Interpolated directions shorter than this are treated as degenerate
const MIN_BLEND_LENGTH: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowCell {
    pub walkable: bool,
    /// Path cost to the target, infinite when unreachable
    pub distance: f64,
    /// Unit vector toward the next cell, zero at the target and on unreachable cells
    pub direction: DVec2,
}

impl FlowCell {
    pub fn is_valid(&self) -> bool {
        self.walkable && self.distance.is_finite()
    }
}

/// Map-wide distance and direction field toward one target cell
#[derive(Debug, Clone)]
pub struct FlowField {
    pub metrics: GridMetrics,
    pub target: Cell,
    /// Map revision the field was built against
    pub revision: u64,
    cells: Vec<FlowCell>,
}

#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    distance: f64,
    index: usize,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Build a flow field toward the cell containing `target`.
///
/// Runs Dijkstra outward from the target with the same step costs and corner
/// rule as [`crate::pathfinding::find_path`]. Returns `None` if the target cell
/// is outside the map or not walkable.
pub fn generate_flow_field(target: DVec2, map: &dyn GridMap) -> Option<FlowField> {
    let metrics = map.metrics();
    let target_cell = metrics.world_to_cell(target.x, target.y);
    let target_index = metrics.index(target_cell)?;

    let walkable = walkable_cells(map, &metrics);
    if !walkable[target_index] {
        debug!("generate_flow_field: target {:?} is not walkable", target_cell);
        return None;
    }

    let mut distance = vec![f64::INFINITY; metrics.cell_count()];
    let mut frontier = BinaryHeap::new();
    distance[target_index] = 0.0;
    frontier.push(FrontierEntry {
        distance: 0.0,
        index: target_index,
    });

    while let Some(FrontierEntry { distance: d, index }) = frontier.pop() {
        if d > distance[index] {
            continue;
        }
        let cell = metrics.cell_at(index);
        for &(d_col, d_row) in NEIGHBOR_STEPS.iter() {
            // Steps are symmetric, so testing the outward step is enough
            let Some(cost) = step_cost(&walkable, &metrics, cell, d_col, d_row) else {
                continue;
            };
            let Some(next) = metrics.index(cell.offset(d_col, d_row)) else {
                continue;
            };
            let next_distance = d + cost;
            if next_distance < distance[next] {
                distance[next] = next_distance;
                frontier.push(FrontierEntry {
                    distance: next_distance,
                    index: next,
                });
            }
        }
    }

    let cells = (0..metrics.cell_count())
        .map(|index| {
            let cell = metrics.cell_at(index);
            let own = distance[index];
            let mut direction = DVec2::ZERO;
            if own.is_finite() && own > 0.0 {
                let mut best = own;
                for &(d_col, d_row) in NEIGHBOR_STEPS.iter() {
                    if step_cost(&walkable, &metrics, cell, d_col, d_row).is_none() {
                        continue;
                    }
                    let Some(next) = metrics.index(cell.offset(d_col, d_row)) else {
                        continue;
                    };
                    if distance[next] < best {
                        best = distance[next];
                        direction = metrics.step_vector(d_col, d_row).normalize_or_zero();
                    }
                }
            }
            FlowCell {
                walkable: walkable[index],
                distance: own,
                direction,
            }
        })
        .collect::<Vec<_>>();

    trace!(
        "generate_flow_field: target {:?}, {} of {} cells reachable",
        target_cell,
        cells.iter().filter(|c| c.is_valid()).count(),
        cells.len()
    );

    Some(FlowField {
        metrics,
        target: target_cell,
        revision: map.revision(),
        cells,
    })
}

impl FlowField {
    pub fn cell(&self, cell: Cell) -> Option<&FlowCell> {
        self.metrics.index(cell).map(|i| &self.cells[i])
    }

    pub fn cells(&self) -> &[FlowCell] {
        &self.cells
    }

    fn valid_cell(&self, cell: Cell) -> Option<&FlowCell> {
        self.cell(cell).filter(|c| c.is_valid())
    }

    /// Distance to the target from the cell containing a world point
    pub fn distance_at(&self, x: f64, z: f64) -> Option<f64> {
        self.valid_cell(self.metrics.world_to_cell(x, z))
            .map(|c| c.distance)
    }

    /// Direction of the containing cell, without blending
    pub fn direction_at(&self, x: f64, z: f64) -> Option<DVec2> {
        self.valid_cell(self.metrics.world_to_cell(x, z))
            .map(|c| c.direction)
    }

    /// Whether the cell containing a world point can reach the target
    pub fn is_reachable(&self, x: f64, z: f64) -> bool {
        self.valid_cell(self.metrics.world_to_cell(x, z)).is_some()
    }

    /// Sample a smooth direction by bilinearly blending the four cell centres around a point.
    ///
    /// Returns `None` when the containing cell is outside the field or cannot reach
    /// the target, and a zero vector inside the target cell. Falls back to the
    /// containing cell's own direction near walls or map edges, or when the blend
    /// cancels out.
    pub fn direction_interpolated(&self, x: f64, z: f64) -> Option<DVec2> {
        let metrics = &self.metrics;
        let containing = metrics.world_to_cell(x, z);
        let own = self.valid_cell(containing)?;
        if containing == self.target {
            return Some(DVec2::ZERO);
        }

        // Cell-centre relative coordinates
        let u = (x - metrics.origin.x) / metrics.cell_width - 0.5;
        let v = (z - metrics.origin.y) / metrics.cell_height - 0.5;
        let col = u.floor() as i32;
        let row = v.floor() as i32;
        let fx = u - col as f64;
        let fz = v - row as f64;

        let corners = [
            self.valid_cell(Cell::new(col, row)),
            self.valid_cell(Cell::new(col + 1, row)),
            self.valid_cell(Cell::new(col, row + 1)),
            self.valid_cell(Cell::new(col + 1, row + 1)),
        ];
        let [Some(c00), Some(c10), Some(c01), Some(c11)] = corners else {
            return Some(own.direction);
        };

        let top = c00.direction.lerp(c10.direction, fx);
        let bottom = c01.direction.lerp(c11.direction, fx);
        let blended = top.lerp(bottom, fz);
        if blended.length() < MIN_BLEND_LENGTH {
            return Some(own.direction);
        }
        Some(blended.normalize())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    field: Arc<FlowField>,
    created_tick: u64,
    last_used_tick: u64,
}

/// Least-recently-used cache of flow fields keyed by target cell.
///
/// Ageing is measured in simulation ticks. The whole cache is dropped when the
/// map revision differs from the one the cached fields were built against.
#[derive(Debug, Clone)]
pub struct FlowFieldCache {
    capacity: usize,
    max_age_ticks: u64,
    revision: Option<u64>,
    entries: HashMap<Cell, CacheEntry>,
    pub hits: u64,
    pub misses: u64,
}

impl Default for FlowFieldCache {
    fn default() -> Self {
        FlowFieldCache::new(20, 150)
    }
}

impl FlowFieldCache {
    pub fn new(capacity: usize, max_age_ticks: u64) -> Self {
        FlowFieldCache {
            capacity: capacity.max(1),
            max_age_ticks,
            revision: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.revision = None;
    }

    pub fn contains(&self, target: Cell) -> bool {
        self.entries.contains_key(&target)
    }

    /// Fetch the field for the target's cell, building it on a miss.
    ///
    /// With `use_cache` false a fresh field is built and the cache is bypassed entirely.
    pub fn get_or_generate(
        &mut self,
        target: DVec2,
        map: &dyn GridMap,
        use_cache: bool,
        now_tick: u64,
    ) -> Option<Arc<FlowField>> {
        if !use_cache {
            return generate_flow_field(target, map).map(Arc::new);
        }

        let revision = map.revision();
        if self.revision != Some(revision) {
            if !self.entries.is_empty() {
                debug!(
                    "flow field cache: map revision {:?} -> {}, dropping {} fields",
                    self.revision,
                    revision,
                    self.entries.len()
                );
            }
            self.entries.clear();
            self.revision = Some(revision);
        }

        let key = map.metrics().world_to_cell(target.x, target.y);
        let max_age = self.max_age_ticks;
        if let Some(entry) = self.entries.get_mut(&key) {
            if now_tick.saturating_sub(entry.created_tick) <= max_age {
                entry.last_used_tick = now_tick;
                self.hits += 1;
                return Some(Arc::clone(&entry.field));
            }
            trace!("flow field cache: {:?} expired", key);
        }
        self.entries.remove(&key);
        self.misses += 1;

        let field = Arc::new(generate_flow_field(target, map)?);
        if self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            key,
            CacheEntry {
                field: Arc::clone(&field),
                created_tick: now_tick,
                last_used_tick: now_tick,
            },
        );
        Some(field)
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(cell, entry)| (entry.last_used_tick, **cell))
            .map(|(cell, _)| *cell);
        if let Some(cell) = oldest {
            trace!("flow field cache: evicting {:?}", cell);
            self.entries.remove(&cell);
        }
    }
}
