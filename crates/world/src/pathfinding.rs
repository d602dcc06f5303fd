//! Grid pathfinding for agents.
//!
//! A* over 4- or 8-connected tile grids with deterministic tie-breaking,
//! nearest-valid-goal substitution, waypoint smoothing and a line-of-liquid
//! check. All queries go through [`TileView`], which only reports tiles that
//! are already loaded; pathfinding never triggers chunk generation.

use crate::tile::Tile;
use bresenham::Bresenham;
use glam::Vec2;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Cost of a cardinal step.
pub const CARDINAL_COST: i32 = 10;
/// Cost of a diagonal step (10 * sqrt(2), rounded).
pub const DIAGONAL_COST: i32 = 14;
/// How far goal substitution searches around an invalid goal.
pub const GOAL_SEARCH_RADIUS: i32 = 3;
/// Safety cap on node expansions per search.
pub const MAX_EXPANSIONS: usize = 4096;
/// Intermediate points inserted between consecutive waypoints by [`smooth_path`].
pub const SMOOTH_STEPS: usize = 3;

/// A 2D grid position used by the deterministic pathfinder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a continuous position.
    pub fn from_world(position: Vec2) -> Self {
        Self {
            x: position.x.floor() as i32,
            y: position.y.floor() as i32,
        }
    }

    /// Centre of the cell in continuous coordinates.
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Neighbourhood used for both searching and the buffer-zone check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Connectivity {
    Four,
    Eight,
}

const CARDINALS: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const ALL_EIGHT: [(i32, i32); 8] = [
    (0, -1),
    (-1, 0),
    (1, 0),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

impl Connectivity {
    /// Neighbour offsets in fixed expansion order, cardinals first.
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &CARDINALS,
            Connectivity::Eight => &ALL_EIGHT,
        }
    }

    /// Admissible, consistent heuristic for this connectivity.
    fn heuristic(self, a: GridPos, b: GridPos) -> i32 {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        match self {
            Connectivity::Four => CARDINAL_COST * (dx + dy),
            Connectivity::Eight => {
                CARDINAL_COST * (dx + dy) + (DIAGONAL_COST - 2 * CARDINAL_COST) * dx.min(dy)
            }
        }
    }

    /// Path length metric matching this connectivity.
    pub fn distance(self, a: GridPos, b: GridPos) -> i32 {
        match self {
            Connectivity::Four => a.manhattan(b),
            Connectivity::Eight => a.chebyshev(b),
        }
    }
}

/// Read-only view of loaded tiles.
///
/// `peek` must not load or generate anything; `None` means "not loaded".
pub trait TileView {
    fn peek(&self, x: i32, y: i32) -> Option<&Tile>;

    fn is_loaded(&self, pos: GridPos) -> bool {
        self.peek(pos.x, pos.y).is_some()
    }

    /// Loaded, non-solid and non-liquid.
    fn is_passable(&self, pos: GridPos) -> bool {
        self.peek(pos.x, pos.y).is_some_and(Tile::is_walkable)
    }

    /// True when a mover may enter the tile at `pos`.
    fn can_enter(&self, pos: GridPos, can_swim: bool) -> bool {
        self.peek(pos.x, pos.y)
            .is_some_and(|tile| !tile.solid && (can_swim || !tile.liquid))
    }

    /// Collision-checked movement.
    ///
    /// Normalises `direction`, scales it by `speed` and returns the new
    /// position, or `None` when the move is blocked. A diagonal step that
    /// crosses a corner tests the horizontal-only and vertical-only sub-moves
    /// and drops whichever axis is obstructed.
    fn try_move(&self, from: Vec2, direction: Vec2, speed: f32, can_swim: bool) -> Option<Vec2> {
        if !from.is_finite() || !direction.is_finite() {
            return None;
        }
        let mut step = direction.normalize_or_zero() * speed;
        if step == Vec2::ZERO {
            return None;
        }

        let current = GridPos::from_world(from);
        let target = GridPos::from_world(from + step);
        if current.x != target.x && current.y != target.y {
            if !self.can_enter(GridPos::new(target.x, current.y), can_swim) {
                step.x = 0.0;
            }
            if !self.can_enter(GridPos::new(current.x, target.y), can_swim) {
                step.y = 0.0;
            }
            if step == Vec2::ZERO {
                return None;
            }
        }

        let destination = from + step;
        self.can_enter(GridPos::from_world(destination), can_swim)
            .then_some(destination)
    }
}

/// A cell an agent may stand on with room to spare.
///
/// The cell must be passable and every neighbour (per `connectivity`) must be
/// loaded and non-solid, so agents never target one-tile pockets.
pub fn valid_position(view: &impl TileView, pos: GridPos, connectivity: Connectivity) -> bool {
    if !view.is_passable(pos) {
        return false;
    }
    connectivity.offsets().iter().all(|&(dx, dy)| {
        view.peek(pos.x + dx, pos.y + dy)
            .is_some_and(|tile| !tile.solid)
    })
}

/// Nearest valid cell to `goal` along a cross pattern of growing radius.
pub fn nearest_valid_goal(
    view: &impl TileView,
    goal: GridPos,
    connectivity: Connectivity,
) -> Option<GridPos> {
    if valid_position(view, goal, connectivity) {
        return Some(goal);
    }
    for radius in 1..=GOAL_SEARCH_RADIUS {
        // All candidates at one radius share the same Manhattan distance, so
        // the first hit in fixed order is the nearest.
        for (dx, dy) in [(radius, 0), (-radius, 0), (0, radius), (0, -radius)] {
            let candidate = goal.offset(dx, dy);
            if valid_position(view, candidate, connectivity) {
                return Some(candidate);
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    /// Total estimated cost.
    f: i32,
    /// Cost so far.
    g: i32,
    pos: GridPos,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert comparisons so the smallest (f, g, pos) is popped first.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.g.cmp(&self.g))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a route from `start` to `goal` with the default expansion cap.
///
/// Returns the waypoints after `start`, ending at `goal` (or its substitute).
/// An empty path means "no path": start unloaded, already at the goal, no
/// valid goal nearby, or the frontier ran dry.
pub fn find_path(
    view: &impl TileView,
    start: GridPos,
    goal: GridPos,
    connectivity: Connectivity,
) -> Vec<GridPos> {
    find_path_bounded(view, start, goal, connectivity, MAX_EXPANSIONS)
}

/// Deterministic A* with an explicit expansion cap.
///
/// Open-set priority is `(f, g, pos)`, so equal-cost alternatives always
/// resolve the same way. Diagonal steps may not cut past a blocked corner.
pub fn find_path_bounded(
    view: &impl TileView,
    start: GridPos,
    goal: GridPos,
    connectivity: Connectivity,
    max_expansions: usize,
) -> Vec<GridPos> {
    if !view.is_loaded(start) || start == goal {
        return Vec::new();
    }
    let Some(goal) = nearest_valid_goal(view, goal, connectivity) else {
        return Vec::new();
    };
    if goal == start {
        return Vec::new();
    }

    let mut open = BinaryHeap::new();
    open.push(OpenNode {
        g: 0,
        f: connectivity.heuristic(start, goal),
        pos: start,
    });

    let mut came_from: BTreeMap<GridPos, GridPos> = BTreeMap::new();
    let mut g_score: BTreeMap<GridPos, i32> = BTreeMap::new();
    g_score.insert(start, 0);

    let mut closed: BTreeSet<GridPos> = BTreeSet::new();

    let mut expansions = 0usize;
    while let Some(node) = open.pop() {
        if !closed.insert(node.pos) {
            continue;
        }

        if node.pos == goal {
            let mut path = vec![goal];
            let mut cur = goal;
            while let Some(prev) = came_from.get(&cur).copied() {
                if prev == start {
                    break;
                }
                path.push(prev);
                cur = prev;
            }
            path.reverse();
            return path;
        }

        expansions += 1;
        if expansions > max_expansions {
            return Vec::new();
        }

        for &(dx, dy) in connectivity.offsets() {
            let neighbor = node.pos.offset(dx, dy);
            if closed.contains(&neighbor) || !view.is_passable(neighbor) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && !(view.is_passable(node.pos.offset(dx, 0))
                    && view.is_passable(node.pos.offset(0, dy)))
            {
                continue;
            }

            let step = if diagonal { DIAGONAL_COST } else { CARDINAL_COST };
            let tentative_g = node.g.saturating_add(step);
            let best_g = g_score.get(&neighbor).copied().unwrap_or(i32::MAX);
            if tentative_g >= best_g {
                continue;
            }

            came_from.insert(neighbor, node.pos);
            g_score.insert(neighbor, tentative_g);
            open.push(OpenNode {
                g: tentative_g,
                f: tentative_g.saturating_add(connectivity.heuristic(neighbor, goal)),
                pos: neighbor,
            });
        }
    }

    Vec::new()
}

/// Cell centres with [`SMOOTH_STEPS`] evenly spaced points between each pair.
///
/// Interpolated points are not re-validated.
pub fn smooth_path(path: &[GridPos]) -> Vec<Vec2> {
    let Some(first) = path.first() else {
        return Vec::new();
    };
    let mut points = Vec::with_capacity(path.len() + (path.len() - 1) * SMOOTH_STEPS);
    points.push(first.center());
    for pair in path.windows(2) {
        let (a, b) = (pair[0].center(), pair[1].center());
        for step in 1..=SMOOTH_STEPS {
            let t = step as f32 / (SMOOTH_STEPS + 1) as f32;
            points.push(a.lerp(b, t));
        }
        points.push(b);
    }
    points
}

/// True when the rasterised line from `a` to `b` (endpoints included) crosses
/// a loaded liquid tile.
pub fn water_between(view: &impl TileView, a: GridPos, b: GridPos) -> bool {
    Bresenham::new((a.x as isize, a.y as isize), (b.x as isize, b.y as isize))
        .map(|(x, y)| (x as i32, y as i32))
        .chain(std::iter::once((b.x, b.y)))
        .any(|(x, y)| view.peek(x, y).is_some_and(|tile| tile.liquid))
}
