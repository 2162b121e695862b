use filpal_heater::{
    ControlBangBang, Heater, HeaterError, HeaterRegistry, HeaterSpec, SimulatedHotend,
    ThermalModel, simulated,
};
use filpal_traits::{ControlledHeater, HeaterControl};
use rstest::rstest;

const STEP: f64 = 0.3;

#[rstest]
#[case("extruder", 210.0)]
#[case("extruder", 240.0)]
#[case("heater_bed", 60.0)]
fn pid_settles_on_target(#[case] name: &str, #[case] target: f64) {
    let mut sim = simulated(name).unwrap();
    sim.heater_mut().set_target(target).unwrap();
    assert!(sim.heater().check_busy(0.0));
    sim.run_for(900.0, STEP);
    let (smoothed, t) = sim.temperature();
    assert_eq!(t, target);
    assert!((smoothed - target).abs() < 0.5, "{name}: {smoothed}");
    assert!(!sim.heater().check_busy(sim.now()));
}

#[test]
fn pid_heats_without_large_overshoot() {
    let mut sim = simulated("extruder").unwrap();
    sim.heater_mut().set_target(210.0).unwrap();
    let mut peak = 0.0_f64;
    for _ in 0..3000 {
        sim.advance(STEP);
        peak = peak.max(sim.temp());
    }
    assert!(peak < 215.0, "peak {peak}");
}

#[test]
fn bang_bang_holds_the_band() {
    let control = ControlBangBang::new(2.0, 1.0).unwrap();
    let heater = Heater::new("extruder", HeaterSpec::EXTRUDER, Box::new(control), 25.0).unwrap();
    let mut sim = SimulatedHotend::new(heater, ThermalModel::HOTEND);
    sim.heater_mut().set_target(210.0).unwrap();
    sim.run_for(600.0, STEP);
    for _ in 0..1000 {
        sim.advance(STEP);
        assert!((205.0..=215.0).contains(&sim.temp()), "{}", sim.temp());
    }
}

#[test]
fn heater_off_cools_to_ambient() {
    let mut sim = simulated("extruder").unwrap();
    sim.heater_mut().set_target(200.0).unwrap();
    sim.run_for(300.0, STEP);
    sim.heater_mut().set_target(0.0).unwrap();
    sim.run_for(1800.0, STEP);
    assert_eq!(sim.heater().last_pwm(), 0.0);
    assert!(sim.temp() < 30.0, "{}", sim.temp());
}

/// Adds a fixed offset to every target before delegating.
struct Offset {
    inner: Box<dyn HeaterControl>,
    by: f64,
}

impl HeaterControl for Offset {
    fn temperature_update(&mut self, read_time: f64, temp: f64, target_temp: f64) -> f64 {
        self.inner.temperature_update(read_time, temp, target_temp + self.by)
    }

    fn check_busy(&self, eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool {
        self.inner.check_busy(eventtime, smoothed_temp, target_temp + self.by)
    }

    fn reset(self: Box<Self>) -> Box<dyn HeaterControl> {
        self.inner
    }

    fn is_corrected(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "offset"
    }
}

#[test]
fn replaced_control_drives_the_heater() {
    let mut sim = simulated("extruder").unwrap();
    sim.heater_mut().set_target(200.0).unwrap();
    sim.replace_control(Box::new(|old: Box<dyn HeaterControl>| -> Box<dyn HeaterControl> {
        Box::new(Offset { inner: old, by: 10.0 })
    }));
    assert_eq!(sim.control_name(), "offset");
    sim.run_for(900.0, STEP);
    // Reported target is unchanged, the block sits at the offset target.
    assert_eq!(sim.temperature().1, 200.0);
    assert!((sim.temp() - 210.0).abs() < 0.5, "{}", sim.temp());

    sim.replace_control(Box::new(|old: Box<dyn HeaterControl>| old.reset()));
    assert_eq!(sim.control_name(), "pid");
}

#[test]
fn registry_lookup() {
    let mut reg = HeaterRegistry::new();
    reg.register(simulated("extruder").unwrap()).unwrap();
    reg.register(simulated("heater_bed").unwrap()).unwrap();
    assert_eq!(reg.names().collect::<Vec<_>>(), ["extruder", "heater_bed"]);
    assert!(matches!(
        reg.register(simulated("extruder").unwrap()),
        Err(HeaterError::InvalidSetting(_))
    ));
    assert_eq!(reg.lookup("heater_bed").map(|h| h.name().to_string()).as_deref(), Some("heater_bed"));
    assert!(reg.lookup("chamber").is_none());
    assert!(matches!(
        reg.require_mut("chamber"),
        Err(HeaterError::UnknownHeater(_))
    ));
}
