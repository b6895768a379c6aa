use std::collections::HashMap;

use tracing::{debug, info};

use crate::allocation::{AllocationModel, OptimizationType};
use crate::catalog::csv::load_csv_catalog;
use crate::catalog::{build_model_data, Catalog};
use crate::config::Config;
use crate::coupling::{exchange, GroundwaterExchange};
use crate::errors::{SolverError, TorneError};
use crate::graph::{NodeId, NodeKind};
use crate::io::results::{BasinRow, FlowRow, ResultBuffers, SubgridRow};
use crate::network::{FlowBuffer, Network};
use crate::nodes::discrete_control::{
    condition_values, handle_crossing, set_initial_truth_states,
};
use crate::scheduler::{CallbackKind, Scheduler};
use crate::solve::integrator::{Integrator, IntegratorOptions, ReturnCode};
use crate::solve::jacobian::JacobianPrototype;
use crate::solve::rhs::water_balance;
use crate::subgrid::Subgrid;

/// A fully initialized simulation: network, state, schedule, and
/// result buffers. Drives the integrator between callback instants and
/// owns the whole lifecycle from initialize to finalize.
#[derive(Clone)]
pub struct Model {
    pub config: Config,
    pub net: Network,
    pub integrator: Integrator,
    pub scheduler: Scheduler,
    pub subgrid: Subgrid,
    pub allocation_models: Vec<AllocationModel>,
    pub results: ResultBuffers,
    pub coupler: Option<Box<dyn GroundwaterExchange>>,
    pub coupling_dt: Option<f64>,
    t_end: f64,
    du: Vec<f64>,
    prev_conditions: Vec<f64>,
    /// Edge flow integrals since the last allocation solve.
    alloc_flow_integral: Vec<f64>,
    alloc_last_t: f64,
    /// Frame bookkeeping for the balance columns of the basin output.
    frame_last_t: f64,
    frame_last_storage: Vec<f64>,
    /// Flow inedge per user, for realized-volume accumulation.
    user_in_edge: Vec<Option<usize>>,
}

impl Model {
    /// Load the csv store named by the config and build the model.
    pub fn initialize(config: Config) -> Result<Model, TorneError> {
        let catalog = load_csv_catalog(&config)?;
        Model::from_catalog(config, &catalog)
    }

    /// Build from any catalog implementation. This is the constructor
    /// the tests use with MemoryCatalog.
    pub fn from_catalog(config: Config, catalog: &dyn Catalog) -> Result<Model, TorneError> {
        config.validate()?;
        let data = build_model_data(catalog, config.allocation.use_allocation)?;
        let mut net = data.net;
        let t_end = config.duration();

        let opts = IntegratorOptions {
            algorithm: config.algorithm(),
            dt: config.solver.dt,
            abstol: config.solver.abstol,
            reltol: config.solver.reltol,
            maxiters: config.solver.maxiters,
            sparse: config.solver.sparse,
        };
        let mut integrator = Integrator::new(data.u0, 0.0, opts);
        if opts.sparse {
            integrator.prototype = Some(JacobianPrototype::from_network(&net));
        }

        let use_allocation =
            config.allocation.use_allocation && !net.graph.subnetwork_ids().is_empty();
        let allocation_dt = if use_allocation {
            Some(config.allocation.timestep)
        } else {
            None
        };
        let scheduler = Scheduler::build(
            &data.forcing_times,
            &data.rating_times,
            allocation_dt,
            None,
            config.solver.saveat,
            0.0,
            t_end,
        );

        let mut allocation_models = vec![];
        if use_allocation {
            for sid in net.graph.subnetwork_ids() {
                allocation_models.push(AllocationModel::new(
                    &net,
                    sid,
                    config.objective_type(),
                    config.allocation.timestep,
                    60.0,
                )?);
            }
        }

        // Bring every derived quantity in line with the initial state:
        // forcing, levels, flows, truth states, initial control states.
        net.basins.apply_forcing(0.0);
        let mut du = vec![0.0; integrator.u.len()];
        water_balance(&mut du, &integrator.u, &mut net, 0.0);
        set_initial_truth_states(&mut net, 0.0);
        for i in 0..net.discrete_controls.n() {
            let truth = net.discrete_controls.truth_string(i);
            match net.discrete_controls.logic_mapping[i].get(&truth).cloned() {
                Some(state) => {
                    crate::nodes::discrete_control::apply_control_state(&mut net, i, &state);
                    net.discrete_controls.control_state[i] = state.clone();
                    let event = crate::nodes::discrete_control::ControlEvent {
                        time: 0.0,
                        control_node_id: net.discrete_controls.node_id[i],
                        truth_state: truth.clone(),
                        control_state: state,
                    };
                    net.discrete_controls.record.push(event);
                }
                None => {
                    if !net.discrete_controls.logic_mapping[i].is_empty() {
                        return Err(TorneError::Config(format!(
                            "{}: no control state for initial truth state {truth:?}",
                            net.discrete_controls.node_id[i]
                        )));
                    }
                }
            }
        }
        water_balance(&mut du, &integrator.u, &mut net, 0.0);
        let prev_conditions = condition_values(&net, 0.0);

        let n_basins = net.basins.n();
        let n_flow_edges = net.graph.n_flow_edges();
        let frame_last_storage = integrator.u[..n_basins].to_vec();
        let user_in_edge = (0..net.user_demands.n())
            .map(|i| {
                net.graph
                    .in_edges(net.user_demands.node_id[i], crate::graph::EdgeKind::Flow)
                    .next()
                    .and_then(|e| e.flow_idx)
            })
            .collect();

        let mut subgrid = data.subgrid;
        subgrid.update(&net.basins);

        Ok(Model {
            config,
            net,
            integrator,
            scheduler,
            subgrid,
            allocation_models,
            results: ResultBuffers::default(),
            coupler: None,
            coupling_dt: None,
            t_end,
            du,
            prev_conditions,
            alloc_flow_integral: vec![0.0; n_flow_edges],
            alloc_last_t: 0.0,
            frame_last_t: 0.0,
            frame_last_storage,
            user_in_edge,
        })
    }

    /// Attach a groundwater adapter exchanged every `dt` seconds. Must
    /// happen before the first update; the schedule is rebuilt.
    pub fn set_coupler(&mut self, coupler: Box<dyn GroundwaterExchange>, dt: f64) {
        self.coupler = Some(coupler);
        self.coupling_dt = Some(dt);
        let allocation_dt = if self.allocation_models.is_empty() {
            None
        } else {
            Some(self.config.allocation.timestep)
        };
        self.scheduler = Scheduler::build(
            &self.net.basins.forcing.times(),
            &self.net.rating_curves.update_times(),
            allocation_dt,
            Some(dt),
            self.config.solver.saveat,
            0.0,
            self.t_end,
        );
    }

    pub fn get_current_time(&self) -> f64 {
        self.integrator.t
    }

    pub fn get_start_time(&self) -> f64 {
        0.0
    }

    pub fn get_end_time(&self) -> f64 {
        self.t_end
    }

    pub fn get_time_units(&self) -> &'static str {
        "s"
    }

    /// Stable-length view of a named state or forcing array, valid
    /// until finalize.
    pub fn get_value_mut(&mut self, name: &str) -> Result<&mut [f64], TorneError> {
        let n_basins = self.net.basins.n();
        match name {
            "basin.storage" => Ok(&mut self.integrator.u[..n_basins]),
            "basin.level" => Ok(&mut self.net.basins.current_level),
            "basin.infiltration" => Ok(&mut self.net.basins.infiltration),
            "basin.drainage" => Ok(&mut self.net.basins.drainage),
            "basin.subgrid_level" => Ok(&mut self.subgrid.level),
            "user_demand.demand" => Ok(&mut self.net.user_demands.demand),
            "user_demand.realized" => Ok(&mut self.net.user_demands.realized),
            _ => Err(TorneError::Config(format!(
                "unknown variable name {name:?}"
            ))),
        }
    }

    /// Run the whole simulation and flush results.
    pub fn run(&mut self) -> Result<(), TorneError> {
        info!(
            "simulating {} .. {} ({} s)",
            self.config.starttime, self.config.endtime, self.t_end
        );
        self.update_until(self.t_end)?;
        self.finalize()
    }

    /// Advance simulation time to `t`, processing every callback due on
    /// the way. Fails when `t` lies in the past.
    pub fn update_until(&mut self, t: f64) -> Result<(), TorneError> {
        if t < self.integrator.t {
            return Err(SolverError::TimeBackwards {
                target: t,
                current: self.integrator.t,
            }
            .into());
        }
        let t = t.min(self.t_end);
        loop {
            match self.scheduler.next_time() {
                Some(te) if te <= t + 1e-9 => {
                    self.advance_to(te)?;
                    let due = self.scheduler.pop_due(self.integrator.t);
                    self.run_callbacks(due)?;
                }
                _ => break,
            }
        }
        self.advance_to(t)?;
        Ok(())
    }

    /// One integrator step (bounded by the next callback), plus any
    /// callbacks that became due.
    pub fn update(&mut self) -> Result<(), TorneError> {
        let t_stop = self.scheduler.next_time().unwrap_or(self.t_end);
        if self.integrator.t < t_stop - 1e-9 {
            self.step_once(t_stop)?;
        }
        if self.integrator.t >= t_stop - 1e-9 {
            let due = self.scheduler.pop_due(self.integrator.t);
            self.run_callbacks(due)?;
        }
        Ok(())
    }

    fn advance_to(&mut self, t_stop: f64) -> Result<(), TorneError> {
        while self.integrator.t < t_stop - 1e-9 {
            self.step_once(t_stop)?;
        }
        Ok(())
    }

    fn step_once(&mut self, t_stop: f64) -> Result<(), TorneError> {
        let flow_start = self.net.flow.clone();
        {
            let Model {
                integrator, net, ..
            } = self;
            integrator.step(t_stop, &mut |du, u, t| water_balance(du, u, net, t))?;
        }
        // Re-evaluate at the accepted state so every cache and the flow
        // buffer match (u, t) exactly.
        water_balance(
            &mut self.du,
            &self.integrator.u,
            &mut self.net,
            self.integrator.t,
        );

        // Negative storages are a hard failure, reported with the basin.
        let tol = 10.0 * self.config.solver.abstol;
        for i in 0..self.net.basins.n() {
            if self.integrator.u[i] < -tol {
                return Err(SolverError::NegativeStorage {
                    node: self.net.basins.node_id[i],
                    storage: self.integrator.u[i],
                    t: self.integrator.t,
                }
                .into());
            }
        }

        // Crossing resolution may pull t back to the crossing instant;
        // t_prev stays at the step start until the (possibly truncated)
        // interval has been integrated.
        self.resolve_crossings()?;
        self.accumulate(&flow_start);
        self.integrator.sync_prev();
        Ok(())
    }

    /// Detect sign changes of the discrete-control conditions over the
    /// last accepted step, bisect the earliest one, rewind to it and
    /// apply the transition.
    fn resolve_crossings(&mut self) -> Result<(), TorneError> {
        let new_conditions = condition_values(&self.net, self.integrator.t);
        let crossed: Vec<usize> = (0..new_conditions.len())
            .filter(|&i| self.prev_conditions[i] * new_conditions[i] < 0.0)
            .collect();
        if crossed.is_empty() {
            self.prev_conditions = new_conditions;
            return Ok(());
        }

        let t0 = self.integrator.t_prev;
        let t1 = self.integrator.t;
        let mut earliest: Option<(f64, usize)> = None;
        let mut u_mid = vec![0.0; self.integrator.u.len()];
        for &idx in &crossed {
            let mut lo = t0;
            let mut hi = t1;
            // Bisect on the linearly interpolated state.
            for _ in 0..40 {
                let mid = 0.5 * (lo + hi);
                self.integrator.interpolate(mid, &mut u_mid);
                water_balance(&mut self.du, &u_mid, &mut self.net, mid);
                let value = condition_values(&self.net, mid)[idx];
                if value * self.prev_conditions[idx] < 0.0 {
                    hi = mid;
                } else {
                    lo = mid;
                }
                if hi - lo < 1e-9 * (1.0 + t1.abs()) {
                    break;
                }
            }
            let t_cross = hi;
            if earliest.map(|(t, _)| t_cross < t).unwrap_or(true) {
                earliest = Some((t_cross, idx));
            }
        }
        let (t_cross, idx) = earliest.unwrap();

        // Rewind to the crossing and apply the transition there.
        self.integrator.interpolate(t_cross, &mut u_mid);
        self.integrator.u.copy_from_slice(&u_mid);
        self.integrator.t = t_cross;
        water_balance(&mut self.du, &u_mid, &mut self.net, t_cross);
        handle_crossing(&mut self.net, idx, t_cross).map_err(TorneError::Config)?;
        water_balance(&mut self.du, &u_mid, &mut self.net, t_cross);
        self.prev_conditions = condition_values(&self.net, t_cross);
        debug!("discrete control transition at t = {t_cross}");
        Ok(())
    }

    /// Trapezoid-accumulate edge flows and vertical fluxes over the
    /// interval just completed, for allocation source means, the
    /// balance report, and the realized user volumes.
    fn accumulate(&mut self, flow_start: &FlowBuffer) {
        let dt = self.integrator.t - self.integrator.t_prev;
        if dt <= 0.0 {
            return;
        }
        let flow_now = &self.net.flow;
        for k in 0..flow_now.edge.len() {
            self.alloc_flow_integral[k] += 0.5 * (flow_start.edge[k] + flow_now.edge[k]) * dt;
        }
        let n_basins = self.net.basins.n();
        let cum = &mut self.net.basins.cumulative;
        for edge in self.net.graph.flow_edges() {
            let k = match edge.flow_idx {
                Some(k) => k,
                None => continue,
            };
            let volume = 0.5 * (flow_start.edge[k] + flow_now.edge[k]) * dt;
            if edge.to.kind == NodeKind::Basin {
                cum.inflow[edge.to.index] += volume;
            }
            if edge.from.kind == NodeKind::Basin {
                cum.outflow[edge.from.index] += volume;
            }
        }
        for i in 0..n_basins {
            cum.precipitation[i] +=
                0.5 * (flow_start.precipitation[i] + flow_now.precipitation[i]) * dt;
            cum.evaporation[i] += 0.5 * (flow_start.evaporation[i] + flow_now.evaporation[i]) * dt;
            cum.drainage[i] += 0.5 * (flow_start.drainage[i] + flow_now.drainage[i]) * dt;
            cum.infiltration[i] +=
                0.5 * (flow_start.infiltration[i] + flow_now.infiltration[i]) * dt;
        }
        for u in 0..self.net.user_demands.n() {
            if let Some(k) = self.user_in_edge[u] {
                self.net.user_demands.realized[u] +=
                    0.5 * (flow_start.edge[k] + flow_now.edge[k]) * dt;
            }
        }
    }

    fn run_callbacks(&mut self, due: Vec<CallbackKind>) -> Result<(), TorneError> {
        if due.is_empty() {
            return Ok(());
        }
        let t = self.integrator.t;
        let has_output = due.contains(&CallbackKind::Output);
        for kind in &due {
            match kind {
                CallbackKind::Forcing => self.net.basins.apply_forcing(t),
                CallbackKind::RatingCurve => self.net.rating_curves.apply_updates(t),
                CallbackKind::Allocation => self.run_allocation()?,
                CallbackKind::Coupling => {
                    if let Some(coupler) = &mut self.coupler {
                        exchange(&mut self.net, coupler.as_mut());
                    }
                }
                // Output runs below, after discrete control had its say.
                CallbackKind::Output => {}
            }
        }
        // Discrete control evaluates after the other callbacks at this
        // instant: a forcing or allocation change can flip a condition
        // without any state motion.
        water_balance(&mut self.du, &self.integrator.u, &mut self.net, t);
        let conditions = condition_values(&self.net, t);
        for idx in 0..conditions.len() {
            if self.prev_conditions[idx] * conditions[idx] < 0.0 {
                handle_crossing(&mut self.net, idx, t).map_err(TorneError::Config)?;
                water_balance(&mut self.du, &self.integrator.u, &mut self.net, t);
            }
        }
        self.prev_conditions = condition_values(&self.net, t);
        // Output samples last so the frame sees the post-callback flows.
        if has_output {
            self.save_frame();
        }
        Ok(())
    }

    /// The collect / main / subnetwork solve sequence of one allocation
    /// instant.
    fn run_allocation(&mut self) -> Result<(), TorneError> {
        let t = self.integrator.t;
        let elapsed = t - self.alloc_last_t;
        let mut mean_flows: HashMap<(NodeId, NodeId), f64> = HashMap::new();
        for edge in self.net.graph.flow_edges() {
            if let Some(k) = edge.flow_idx {
                let mean = if elapsed > 0.0 {
                    self.alloc_flow_integral[k] / elapsed
                } else {
                    self.net.flow.edge[k]
                };
                mean_flows.insert((edge.from, edge.to), mean);
            }
        }

        let has_main = self.allocation_models.iter().any(|m| m.subnetwork_id == 1);
        let has_subs = self.allocation_models.iter().any(|m| m.subnetwork_id != 1);
        if has_main && has_subs {
            for model in &mut self.allocation_models {
                if model.subnetwork_id != 1 {
                    model.optimize(
                        &mut self.net,
                        t,
                        OptimizationType::CollectDemands,
                        &mean_flows,
                    )?;
                }
            }
            let mut demands: Vec<((NodeId, NodeId), Vec<f64>)> = vec![];
            for model in &self.allocation_models {
                if model.subnetwork_id != 1 {
                    for (key, d) in &model.subnetwork_demands {
                        demands.push((*key, d.clone()));
                    }
                }
            }
            let main = self
                .allocation_models
                .iter_mut()
                .find(|m| m.subnetwork_id == 1)
                .unwrap();
            for (key, d) in demands {
                if main.subnetwork_demands.contains_key(&key) {
                    main.subnetwork_demands.insert(key, d);
                }
            }
            main.optimize(&mut self.net, t, OptimizationType::Allocate, &mean_flows)?;
            let granted: Vec<((NodeId, NodeId), Vec<f64>)> = main
                .subnetwork_allocateds
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect();
            for model in &mut self.allocation_models {
                if model.subnetwork_id == 1 {
                    continue;
                }
                for (key, grant) in &granted {
                    if model.subnetwork_allocateds.contains_key(key) {
                        model.subnetwork_allocateds.insert(*key, grant.clone());
                    }
                }
                model.optimize(&mut self.net, t, OptimizationType::Allocate, &mean_flows)?;
            }
        } else {
            for model in &mut self.allocation_models {
                model.optimize(&mut self.net, t, OptimizationType::Allocate, &mean_flows)?;
            }
        }

        self.alloc_flow_integral.iter_mut().for_each(|v| *v = 0.0);
        self.alloc_last_t = t;
        Ok(())
    }

    /// Append one output frame: basin balances, a post-callback flow
    /// snapshot, subgrid levels, and whatever control or allocation
    /// records accumulated since the last frame.
    fn save_frame(&mut self) {
        let t = self.integrator.t;
        let dt_frame = t - self.frame_last_t;
        for i in 0..self.net.basins.n() {
            let storage = self.integrator.u[i];
            let cum = &self.net.basins.cumulative;
            let (inflow_rate, outflow_rate, p, e, d, inf) = if dt_frame > 0.0 {
                (
                    cum.inflow[i] / dt_frame,
                    cum.outflow[i] / dt_frame,
                    cum.precipitation[i] / dt_frame,
                    cum.evaporation[i] / dt_frame,
                    cum.drainage[i] / dt_frame,
                    cum.infiltration[i] / dt_frame,
                )
            } else {
                (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
            };
            let storage_rate = if dt_frame > 0.0 {
                (storage - self.frame_last_storage[i]) / dt_frame
            } else {
                0.0
            };
            let balance_error = if dt_frame > 0.0 {
                storage_rate - (inflow_rate - outflow_rate + p + d - e - inf)
            } else {
                0.0
            };
            let total_rate = inflow_rate + outflow_rate + p + e + d + inf;
            let relative_error = if total_rate > 1e-10 {
                balance_error / total_rate
            } else {
                0.0
            };
            self.results.basin.push(BasinRow {
                time: t,
                node_id: self.net.basins.node_id[i].external_id,
                storage,
                level: self.net.basins.current_level[i],
                inflow_rate,
                outflow_rate,
                precipitation: p,
                evaporation: e,
                drainage: d,
                infiltration: inf,
                balance_error,
                relative_error,
            });
        }
        for edge in self.net.graph.flow_edges() {
            if let Some(k) = edge.flow_idx {
                self.results.flow.push(FlowRow {
                    time: t,
                    edge_id: Some(edge.id),
                    from_node_id: edge.from.external_id,
                    to_node_id: edge.to.external_id,
                    flow_rate: self.net.flow.edge[k],
                });
            }
        }
        // Vertical-flux totals as self-edges with a null edge id.
        for i in 0..self.net.basins.n() {
            let net_vertical = self.net.flow.precipitation[i] + self.net.flow.drainage[i]
                - self.net.flow.evaporation[i]
                - self.net.flow.infiltration[i];
            let ext = self.net.basins.node_id[i].external_id;
            self.results.flow.push(FlowRow {
                time: t,
                edge_id: None,
                from_node_id: ext,
                to_node_id: ext,
                flow_rate: net_vertical,
            });
        }
        self.subgrid.update(&self.net.basins);
        for i in 0..self.subgrid.n() {
            self.results.subgrid.push(SubgridRow {
                time: t,
                subgrid_id: self.subgrid.subgrid_id[i],
                subgrid_level: self.subgrid.level[i],
            });
        }
        self.results
            .control
            .extend(self.net.discrete_controls.record.drain(..));
        for model in &mut self.allocation_models {
            self.results.allocation.extend(model.records.drain(..));
            self.results
                .allocation_flow
                .extend(model.flow_records.drain(..));
        }

        let cum = &mut self.net.basins.cumulative;
        cum.inflow.iter_mut().for_each(|v| *v = 0.0);
        cum.outflow.iter_mut().for_each(|v| *v = 0.0);
        cum.precipitation.iter_mut().for_each(|v| *v = 0.0);
        cum.evaporation.iter_mut().for_each(|v| *v = 0.0);
        cum.drainage.iter_mut().for_each(|v| *v = 0.0);
        cum.infiltration.iter_mut().for_each(|v| *v = 0.0);
        self.frame_last_t = t;
        self.frame_last_storage
            .copy_from_slice(&self.integrator.u[..self.net.basins.n()]);
    }

    /// Flush result files. The buffers hold whatever frames were
    /// appended, so a failed run still writes its partial results.
    pub fn finalize(&mut self) -> Result<(), TorneError> {
        self.results.control
            .extend(self.net.discrete_controls.record.drain(..));
        for model in &mut self.allocation_models {
            self.results.allocation.extend(model.records.drain(..));
            self.results
                .allocation_flow
                .extend(model.flow_records.drain(..));
        }
        self.results.write_all(
            &self.config.results_dir,
            self.config.results.compression,
            self.config.results.compression_level,
        )?;
        if let Some(path) = &self.config.results.outstate {
            let basins: Vec<(NodeId, f64)> = (0..self.net.basins.n())
                .map(|i| {
                    (
                        self.net.basins.node_id[i],
                        self.net.basins.current_level[i],
                    )
                })
                .collect();
            crate::io::results::write_outstate(path, &basins)?;
        }
        info!(
            "finished at t = {} s: {} steps accepted, {} rejected, {} rhs calls",
            self.integrator.t,
            self.integrator.stats.naccept,
            self.integrator.stats.nreject,
            self.integrator.stats.nf
        );
        Ok(())
    }

    /// Integrator disposition for the closing log line.
    pub fn return_code(&self) -> ReturnCode {
        if self.integrator.t >= self.t_end - 1e-9 {
            ReturnCode::Success
        } else {
            ReturnCode::Failure
        }
    }
}
