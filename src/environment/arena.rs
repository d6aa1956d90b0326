//! Lightweight kinematic arena used for demos and tests.
//!
//! Disk-shaped robots with unicycle kinematics drive inside a rectangular
//! room. Each robot has its own goal disk. Range rays hit the room walls and
//! other active robots. Collisions end a robot's episode; there is no contact
//! response.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::simulation::{Simulation, Termination};
use crate::config::ConfigError;
use crate::types::{Action, Observation, Position, RobotKinematics};

/// Configuration for [`KinematicArena`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Room width at level 0, in meters.
    pub width: f64,
    /// Room height at level 0, in meters.
    pub height: f64,
    /// Room growth per level (`size × (1 + level_growth × level)`).
    pub level_growth: f64,
    /// Number of robots.
    pub n_robots: usize,
    pub robot_radius: f64,
    pub goal_radius: f64,
    /// Number of range rays, evenly spread around the robot.
    pub n_rays: usize,
    /// Maximum ray length; readings are normalized by it.
    pub max_range: f64,
    /// Duration of one step, in seconds.
    pub dt: f64,
    /// Linear speed at action `linear = 1`.
    pub max_linear_speed: f64,
    /// Angular speed at action `angular = 1`.
    pub max_angular_speed: f64,
    /// Seed for start and goal placement.
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 10.0,
            level_growth: 0.5,
            n_robots: 4,
            robot_radius: 0.25,
            goal_radius: 0.4,
            n_rays: 16,
            max_range: 5.0,
            dt: 0.1,
            max_linear_speed: 1.5,
            max_angular_speed: 2.0,
            seed: 42,
        }
    }
}

impl ArenaConfig {
    /// Observation feature dimension produced by the arena.
    pub fn observation_dim(&self) -> usize {
        Observation::feature_dim(self.n_rays)
    }

    /// Checks that robots fit in the room and every physical constant is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| ConfigError::Invalid { field, reason };
        if self.n_robots == 0 {
            return Err(invalid("arena.n_robots", "must be positive".into()));
        }
        if self.n_rays == 0 {
            return Err(invalid("arena.n_rays", "must be positive".into()));
        }
        let positive = [
            ("arena.robot_radius", self.robot_radius),
            ("arena.goal_radius", self.goal_radius),
            ("arena.dt", self.dt),
            ("arena.max_range", self.max_range),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("{value} must be positive")));
            }
        }
        let min_side = self.robot_radius * 4.0;
        for (field, value) in [("arena.width", self.width), ("arena.height", self.height)] {
            if !(value.is_finite() && value > min_side) {
                return Err(invalid(
                    field,
                    format!("{value} must exceed four robot radii ({min_side})"),
                ));
            }
        }
        let non_negative = [
            ("arena.level_growth", self.level_growth),
            ("arena.max_linear_speed", self.max_linear_speed),
            ("arena.max_angular_speed", self.max_angular_speed),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("{value} must not be negative")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Robot {
    position: Position,
    last_position: Position,
    heading: f64,
    goal: Position,
    linear: f64,
    angular: f64,
    active: bool,
}

/// Rectangular room with disk robots. See the module docs.
#[derive(Debug)]
pub struct KinematicArena {
    config: ArenaConfig,
    width: f64,
    height: f64,
    robots: Vec<Robot>,
    rng: StdRng,
}

impl KinematicArena {
    /// Creates an arena; call [`Simulation::reset`] before stepping.
    pub fn new(config: ArenaConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let (width, height) = (config.width, config.height);
        Self {
            config,
            width,
            height,
            robots: Vec::new(),
            rng,
        }
    }

    /// Returns the arena configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Room size for the current level.
    pub fn room_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Places robot `robot` and its goal explicitly. Used by tests and scripted scenarios.
    pub fn place(&mut self, robot: usize, position: Position, heading: f64, goal: Position) {
        if let Some(r) = self.robots.get_mut(robot) {
            r.position = position;
            r.last_position = position;
            r.heading = heading;
            r.goal = goal;
        }
    }

    fn random_free_point(&mut self, taken: &[Position], clearance: f64) -> Position {
        let margin = self.config.robot_radius * 2.0;
        let mut candidate = Position::new(self.width / 2.0, self.height / 2.0);
        for _ in 0..100 {
            candidate = Position::new(
                self.rng.gen_range(margin..(self.width - margin)),
                self.rng.gen_range(margin..(self.height - margin)),
            );
            if taken.iter().all(|p| p.distance_to(&candidate) >= clearance) {
                break;
            }
        }
        candidate
    }

    fn hits_wall(&self, p: &Position) -> bool {
        let r = self.config.robot_radius;
        p.x - r <= 0.0 || p.y - r <= 0.0 || p.x + r >= self.width || p.y + r >= self.height
    }

    fn ray_length(&self, robot: usize, angle: f64) -> f64 {
        let origin = self.robots[robot].position;
        let (dx, dy) = (angle.cos(), angle.sin());
        let mut best = self.config.max_range;

        let mut consider = |t: f64| {
            if t >= 0.0 && t < best {
                best = t;
            }
        };
        if dx > 1e-12 {
            consider((self.width - origin.x) / dx);
        } else if dx < -1e-12 {
            consider(-origin.x / dx);
        }
        if dy > 1e-12 {
            consider((self.height - origin.y) / dy);
        } else if dy < -1e-12 {
            consider(-origin.y / dy);
        }

        let r = self.config.robot_radius;
        for (j, other) in self.robots.iter().enumerate() {
            if j == robot || !other.active {
                continue;
            }
            let (cx, cy) = (other.position.x - origin.x, other.position.y - origin.y);
            let along = cx * dx + cy * dy;
            if along <= 0.0 {
                continue;
            }
            let perp_sq = cx * cx + cy * cy - along * along;
            if perp_sq <= r * r {
                consider(along - (r * r - perp_sq).sqrt());
            }
        }
        best
    }
}

impl Simulation for KinematicArena {
    fn reset(&mut self, level: usize) {
        let scale = 1.0 + self.config.level_growth * level as f64;
        self.width = self.config.width * scale;
        self.height = self.config.height * scale;

        let clearance = self.config.robot_radius * 4.0;
        let mut starts: Vec<Position> = Vec::with_capacity(self.config.n_robots);
        for _ in 0..self.config.n_robots {
            let p = self.random_free_point(&starts, clearance);
            starts.push(p);
        }
        let mut goals: Vec<Position> = Vec::with_capacity(self.config.n_robots);
        for _ in 0..self.config.n_robots {
            let taken: Vec<Position> = starts.iter().chain(goals.iter()).copied().collect();
            let g = self.random_free_point(&taken, clearance);
            goals.push(g);
        }

        self.robots = starts
            .into_iter()
            .zip(goals)
            .map(|(position, goal)| Robot {
                position,
                last_position: position,
                heading: self.rng.gen_range(-PI..PI),
                goal,
                linear: 0.0,
                angular: 0.0,
                active: true,
            })
            .collect();
    }

    fn step(&mut self, actions: &[Option<Action>], steps_left: u32) -> Vec<Option<Termination>> {
        let dt = self.config.dt;
        let was_active: Vec<bool> = self.robots.iter().map(|r| r.active).collect();

        for (robot, action) in self.robots.iter_mut().zip(actions) {
            robot.last_position = robot.position;
            if !robot.active {
                continue;
            }
            let a = action.unwrap_or_default().clamped();
            robot.linear = a.linear;
            robot.angular = a.angular;
            robot.heading += a.angular * self.config.max_angular_speed * dt;
            let v = a.linear * self.config.max_linear_speed * dt;
            robot.position.x += v * robot.heading.cos();
            robot.position.y += v * robot.heading.sin();
        }

        let min_gap = self.config.robot_radius * 2.0;
        let mut results = vec![None; self.robots.len()];
        for i in 0..self.robots.len() {
            if !was_active[i] {
                continue;
            }
            let me = &self.robots[i];
            let robot_contact = self.robots.iter().enumerate().any(|(j, other)| {
                j != i && was_active[j] && other.position.distance_to(&me.position) < min_gap
            });
            let reached_goal = me.position.distance_to(&me.goal) < self.config.goal_radius;
            let collision = !reached_goal && (robot_contact || self.hits_wall(&me.position));
            let term = Termination {
                collision,
                reached_goal,
                timed_out: !reached_goal && !collision && steps_left == 0,
            };
            results[i] = Some(term);
        }

        for (robot, term) in self.robots.iter_mut().zip(&results) {
            if term.is_some_and(|t| t.is_done()) {
                robot.active = false;
            }
        }
        results
    }

    fn observation(&self, robot: usize) -> Observation {
        let r = &self.robots[robot];
        let n = self.config.n_rays;
        let lidar = (0..n)
            .map(|k| {
                let angle = r.heading + 2.0 * PI * k as f64 / n as f64;
                self.ray_length(robot, angle) / self.config.max_range
            })
            .collect();
        let relative = r.position.bearing_to(&r.goal) - r.heading;
        let diagonal = (self.width * self.width + self.height * self.height).sqrt();
        Observation {
            lidar,
            orientation_to_goal: [relative.sin(), relative.cos()],
            distance_to_goal: r.position.distance_to(&r.goal) / diagonal,
            velocity: [r.linear, r.angular],
        }
    }

    fn kinematics(&self, robot: usize) -> RobotKinematics {
        let r = &self.robots[robot];
        RobotKinematics {
            position: r.position,
            last_position: r.last_position,
            goal: r.goal,
            heading: r.heading,
            linear_velocity: r.linear * self.config.max_linear_speed,
            angular_velocity: r.angular * self.config.max_angular_speed,
        }
    }

    fn num_robots(&self) -> usize {
        self.robots.len()
    }

    fn is_active(&self, robot: usize) -> bool {
        self.robots.get(robot).is_some_and(|r| r.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(n_robots: usize) -> KinematicArena {
        let mut a = KinematicArena::new(ArenaConfig {
            n_robots,
            ..ArenaConfig::default()
        });
        a.reset(0);
        a
    }

    #[test]
    fn reset_activates_all_robots() {
        let a = arena(3);
        assert_eq!(a.num_robots(), 3);
        assert!((0..3).all(|i| a.is_active(i)));
        assert_eq!(a.observation(0).features().len(), a.config().observation_dim());
    }

    #[test]
    fn level_scales_room() {
        let mut a = arena(1);
        a.reset(2);
        assert_eq!(a.room_size(), (20.0, 20.0));
    }

    #[test]
    fn driving_forward_moves_along_heading() {
        let mut a = arena(1);
        a.place(0, Position::new(5.0, 5.0), 0.0, Position::new(9.0, 9.0));
        let res = a.step(&[Some(Action::new(1.0, 0.0))], 10);
        assert_eq!(res[0], Some(Termination::default()));
        let k = a.kinematics(0);
        assert!((k.position.x - 5.15).abs() < 1e-9);
        assert!((k.last_position.x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn reaching_goal_deactivates_robot() {
        let mut a = arena(2);
        a.place(0, Position::new(5.0, 5.0), 0.0, Position::new(5.1, 5.0));
        a.place(1, Position::new(2.0, 2.0), 0.0, Position::new(8.0, 8.0));
        let res = a.step(&[Some(Action::new(0.5, 0.0)), Some(Action::default())], 10);
        assert!(res[0].unwrap().reached_goal);
        assert!(!a.is_active(0));
        assert!(a.is_active(1));

        let res = a.step(&[None, Some(Action::default())], 9);
        assert_eq!(res[0], None);
        assert!(res[1].is_some());
    }

    #[test]
    fn wall_contact_is_collision() {
        let mut a = arena(1);
        a.place(0, Position::new(0.3, 5.0), PI, Position::new(8.0, 8.0));
        let res = a.step(&[Some(Action::new(1.0, 0.0))], 10);
        assert!(res[0].unwrap().collision);
    }

    #[test]
    fn robots_touching_collide() {
        let mut a = arena(2);
        a.place(0, Position::new(5.0, 5.0), 0.0, Position::new(1.0, 1.0));
        a.place(1, Position::new(5.6, 5.0), PI, Position::new(9.0, 1.0));
        let res = a.step(&[Some(Action::new(1.0, 0.0)), Some(Action::new(1.0, 0.0))], 10);
        assert!(res[0].unwrap().collision);
        assert!(res[1].unwrap().collision);
    }

    #[test]
    fn exhausted_budget_times_out_everyone_still_driving() {
        let mut a = arena(2);
        a.place(0, Position::new(3.0, 3.0), 0.0, Position::new(8.0, 8.0));
        a.place(1, Position::new(6.0, 6.0), 0.0, Position::new(1.0, 8.0));
        let res = a.step(&[Some(Action::default()), Some(Action::default())], 0);
        assert!(res.iter().all(|r| r.unwrap().timed_out));
        assert!(!a.is_active(0) && !a.is_active(1));
    }

    #[test]
    fn lidar_sees_nearest_wall() {
        let mut a = KinematicArena::new(ArenaConfig {
            n_robots: 1,
            n_rays: 4,
            ..ArenaConfig::default()
        });
        a.reset(0);
        a.place(0, Position::new(1.0, 5.0), PI, Position::new(8.0, 8.0));
        let obs = a.observation(0);
        // Ray 0 points along the heading, straight at the left wall.
        assert!((obs.lidar[0] - 1.0 / 5.0).abs() < 1e-9);
    }
}
