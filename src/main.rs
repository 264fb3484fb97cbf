use nimbus::entity::EntityContext;
use nimbus::{
    EntityId, Event, Host, Payload, Resource, ResourceList, SimEntity, SimResult, Simulation,
    SimulationConfig, SpaceShared, Tag, VmId,
};
use tracing_subscriber::EnvFilter;

/// Places VMs on the first host that accepts them and tears each one down
/// after its lifetime.
#[derive(Debug, Clone)]
struct Broker {
    hosts: Vec<String>,
    /// `(vm, pe ratings, lifetime)`
    vms: Vec<(VmId, Vec<f64>, f64)>,
    /// Index into `hosts` of the next attempt for each VM.
    attempt: Vec<usize>,
    placed: Vec<(VmId, EntityId)>,
    rejected: Vec<VmId>,
}

impl Broker {
    fn demand(ratings: &[f64]) -> ResourceList {
        ratings
            .iter()
            .enumerate()
            .map(|(i, mips)| Resource::pe(format!("pe{i}"), *mips))
            .collect()
    }

    fn submit(&mut self, ctx: &mut EntityContext<'_>, idx: usize) -> SimResult<()> {
        let (vm, ratings, _) = &self.vms[idx];
        let Some(name) = self.hosts.get(self.attempt[idx]) else {
            self.rejected.push(*vm);
            return Ok(());
        };
        let host = ctx
            .lookup(name)
            .ok_or_else(|| ctx.error(format!("unknown host {name}")))?;
        let request = Payload::VmRequest {
            vm: *vm,
            demand: Broker::demand(ratings),
        };
        ctx.send_now(host, Tag::VmCreate, request)
    }
}

impl SimEntity for Broker {
    fn start_entity(&mut self, ctx: &mut EntityContext<'_>) -> SimResult<()> {
        self.attempt = vec![0; self.vms.len()];
        for idx in 0..self.vms.len() {
            self.submit(ctx, idx)?;
        }
        Ok(())
    }

    fn process_event(&mut self, ctx: &mut EntityContext<'_>, event: Event) -> SimResult<()> {
        let Payload::VmAck { vm, success } = *event.payload() else {
            return Ok(());
        };
        if event.tag() != Tag::VmCreateAck {
            return Ok(());
        }
        let idx = self
            .vms
            .iter()
            .position(|(id, _, _)| *id == vm)
            .ok_or_else(|| ctx.error(format!("ack for unknown {vm}")))?;
        let host = event.source().ok_or_else(|| ctx.error("ack without source"))?;
        if success {
            self.placed.push((vm, host));
            let lifetime = self.vms[idx].2;
            let request = Payload::VmRequest {
                vm,
                demand: ResourceList::new(),
            };
            ctx.send(host, lifetime, Tag::VmDestroy, request)
        } else {
            self.attempt[idx] += 1;
            self.submit(ctx, idx)
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn clone_entity(&self) -> Box<dyn SimEntity> {
        Box::new(self.clone())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  Nimbus — discrete-event datacenter simulation");
    println!("  Space-shared VM placement on two hosts");
    println!("═══════════════════════════════════════════════════════");
    println!();

    let run1 = match run_datacenter("Run 1") {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("  run 1 failed: {e}");
            std::process::exit(1);
        }
    };
    let run2 = match run_datacenter("Run 2") {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("  run 2 failed: {e}");
            std::process::exit(1);
        }
    };

    println!("  Verification:");
    if run1 == run2 {
        println!("    ✓ Traces are IDENTICAL ({} events).", run1.len());
    } else {
        println!("    ✗ MISMATCH — the two runs diverged!");
        std::process::exit(1);
    }
}

fn run_datacenter(label: &str) -> SimResult<Vec<String>> {
    let mut sim = Simulation::with_config(SimulationConfig::default().with_trace(true))?;

    sim.register(
        "host0",
        Box::new(Host::new(SpaceShared::new([
            Resource::pe("h0-pe0", 1000.0),
            Resource::pe("h0-pe1", 1000.0),
            Resource::ram("h0-ram", 4096.0),
        ]))),
    )?;
    sim.register(
        "host1",
        Box::new(Host::new(SpaceShared::new([
            Resource::pe("h1-pe0", 2500.0),
            Resource::pe("h1-pe1", 500.0),
            Resource::pe("h1-pe2", 500.0),
        ]))),
    )?;
    let broker = sim.register(
        "broker",
        Box::new(Broker {
            hosts: vec!["host0".into(), "host1".into()],
            vms: vec![
                (VmId::new(1), vec![1000.0, 1000.0], 10.0),
                (VmId::new(2), vec![2000.0], 5.0),
                (VmId::new(3), vec![500.0], 7.5),
                (VmId::new(4), vec![800.0], 3.0),
            ],
            attempt: Vec::new(),
            placed: Vec::new(),
            rejected: Vec::new(),
        }),
    )?;

    let summary = sim.run()?;
    println!(
        "  {}: {} events, stopped at {} ({:?})",
        label, summary.steps, summary.final_time, summary.reason
    );
    if let Some(b) = sim.entity::<Broker>(broker) {
        for (vm, host) in &b.placed {
            let name = sim.entity_name(*host).unwrap_or("?");
            println!("    {} placed on {}", vm, name);
        }
        for vm in &b.rejected {
            println!("    {} rejected by every host", vm);
        }
    }
    println!();

    Ok(sim.trace().iter().map(ToString::to_string).collect())
}
