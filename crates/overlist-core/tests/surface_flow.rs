use chrono::Utc;
use overlist_core::coordinator::Coordinator;
use overlist_core::placement::{Point, Viewport};
use overlist_core::reorder::DropOutcome;
use overlist_core::replica::{Replica, SurfaceKind};
use overlist_core::settings::{CornerPosition, SettingsPatch};
use overlist_core::store::{StoreBus, keys};
use overlist_core::task::Task;
use tempfile::tempdir;

const VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 800.0,
};

fn open_bus(dir: &std::path::Path) -> StoreBus {
    StoreBus::open(&dir.join("store.json"))
}

#[test]
fn two_surfaces_converge_through_the_bus() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());

    let mut overlay = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    let mut page = Replica::new(SurfaceKind::FullPage, bus.clone(), VIEWPORT);
    overlay.mount();
    page.mount();

    assert!(overlay.add_task("buy milk", Utc::now()));
    assert!(overlay.add_task("water plants", Utc::now()));
    assert_eq!(page.tasks().len(), 0);

    page.pump();
    assert_eq!(page.tasks().len(), 2);
    assert_eq!(page.tasks()[0].text, "buy milk");

    let id = page.tasks()[1].id.clone();
    assert!(page.toggle_task(&id));
    overlay.pump();
    assert!(overlay.tasks()[1].done);

    overlay.set_panel_open(true);
    page.pump();
    assert!(page.panel_open());
}

#[test]
fn reopened_store_still_has_the_list() {
    let temp = tempdir().expect("tempdir");
    {
        let bus = open_bus(temp.path());
        let mut surface = Replica::new(SurfaceKind::Overlay, bus, VIEWPORT);
        surface.mount();
        assert!(surface.add_task("persisted", Utc::now()));
    }

    let bus = open_bus(temp.path());
    let mut surface = Replica::new(SurfaceKind::Overlay, bus, VIEWPORT);
    surface.mount();
    assert_eq!(surface.tasks().len(), 1);
    assert_eq!(surface.tasks()[0].text, "persisted");
}

#[test]
fn corrupt_store_file_reads_as_empty() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("store.json");
    std::fs::write(&path, b"{not json").expect("write corrupt file");

    let bus = StoreBus::open(&path);
    assert!(bus.read::<Vec<Task>>(keys::TASKS).is_none());

    let mut surface = Replica::new(SurfaceKind::Overlay, bus, VIEWPORT);
    surface.mount();
    assert!(surface.tasks().is_empty());
}

#[test]
fn remote_list_change_is_ignored_during_a_drag_and_superseded_by_the_drop() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());

    let mut dragging = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    let mut remote = Replica::new(SurfaceKind::FullPage, bus.clone(), VIEWPORT);
    dragging.mount();
    remote.mount();

    dragging.add_task("first", Utc::now());
    dragging.add_task("second", Utc::now());
    remote.pump();
    dragging.set_panel_open(true);

    let first_id = dragging.tasks()[0].id.clone();
    let second_id = dragging.tasks()[1].id.clone();
    dragging.begin_row_drag(&first_id);
    assert!(dragging.is_reordering());

    // A concurrent write lands while the drag is in flight.
    remote.add_task("intruder", Utc::now());
    dragging.pump();
    assert_eq!(dragging.tasks().len(), 2, "stale cache kept during drag");

    // Marker lands past the second row's midpoint.
    let rows = dragging.view().expect("mounted view").rows.clone();
    let below = rows
        .iter()
        .find(|row| row.id == second_id)
        .map(|row| row.mid_y() + 1.0)
        .expect("second row rendered");
    dragging.row_drag_over(&second_id, below);

    let outcome = dragging.complete_row_drag();
    assert!(matches!(outcome, DropOutcome::Moved(_)));
    assert_eq!(dragging.tasks()[0].text, "second");
    assert_eq!(dragging.tasks()[1].text, "first");

    // Last write wins: the drop overwrote the list the remote surface built.
    remote.pump();
    assert_eq!(remote.tasks().len(), 2);
    assert_eq!(remote.tasks()[0].text, "second");
}

#[test]
fn ambiguous_drop_writes_nothing() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());

    let mut surface = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    surface.mount();
    surface.add_task("only", Utc::now());
    surface.set_panel_open(true);

    let before = bus.get(keys::TASKS);
    let id = surface.tasks()[0].id.clone();
    surface.begin_row_drag(&id);
    // No drag-over ever resolves a marker.
    assert!(matches!(surface.complete_row_drag(), DropOutcome::NoMarker));
    assert_eq!(bus.get(keys::TASKS), before);
}

#[test]
fn disabling_unmounts_the_overlay_and_the_relay_remounts_it() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());
    let coordinator = Coordinator::new(bus.clone());
    coordinator.install();

    let mut overlay = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT)
        .with_relay(coordinator.register_surface());
    overlay.mount();
    overlay.add_task("survives unmount", Utc::now());

    coordinator.set_settings(SettingsPatch {
        enabled: Some(false),
        ..SettingsPatch::default()
    });
    overlay.pump();
    assert!(!overlay.is_mounted());
    assert!(overlay.tasks().is_empty(), "cache dropped with the mount");

    // The bus subscription died with the mount; only the coordinator's
    // relay can reach this surface now.
    coordinator.set_settings(SettingsPatch {
        enabled: Some(true),
        ..SettingsPatch::default()
    });
    overlay.pump();
    assert!(overlay.is_mounted());
    assert_eq!(overlay.tasks().len(), 1, "remount rereads the bus");
}

#[test]
fn full_page_stays_mounted_when_disabled() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());
    let coordinator = Coordinator::new(bus.clone());
    coordinator.install();

    let mut page = Replica::new(SurfaceKind::FullPage, bus.clone(), VIEWPORT);
    page.mount();

    coordinator.set_settings(SettingsPatch {
        enabled: Some(false),
        ..SettingsPatch::default()
    });
    page.pump();
    assert!(page.is_mounted());
    assert!(!page.settings().enabled);
}

#[test]
fn position_changes_reach_every_surface() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());
    let coordinator = Coordinator::new(bus.clone());
    coordinator.install();

    let mut overlay = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    overlay.mount();

    coordinator.set_settings(SettingsPatch {
        position: Some(CornerPosition::BottomLeft),
        ..SettingsPatch::default()
    });
    overlay.pump();
    assert_eq!(overlay.settings().position, CornerPosition::BottomLeft);

    let control = overlay.view().expect("mounted view").control;
    assert_eq!(control.x, 22.0);
    assert_eq!(control.y, VIEWPORT.height - 22.0 - control.height);
}

#[test]
fn control_drag_persists_and_propagates() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());

    let mut overlay = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    let mut mirror = Replica::new(SurfaceKind::FullPage, bus.clone(), VIEWPORT);
    overlay.mount();
    mirror.mount();

    // Grab the control near its top-right default anchor and drag it far
    // past the click threshold.
    let control = overlay.view().expect("mounted view").control;
    let press = Point {
        x: control.x + 8.0,
        y: control.y + 8.0,
    };
    overlay.control_pointer_down(7, press);
    overlay.control_pointer_move(
        7,
        Point {
            x: 600.0,
            y: 400.0,
        },
    );
    assert!(
        bus.get(keys::CONTROL_POS).is_none(),
        "nothing persists mid-drag"
    );

    overlay.control_pointer_up(
        7,
        Point {
            x: 600.0,
            y: 400.0,
        },
    );
    assert_eq!(overlay.control_position(), Some(Point { x: 592.0, y: 392.0 }));
    assert!(bus.get(keys::CONTROL_POS).is_some());

    mirror.pump();
    let mirrored = mirror.view().expect("mounted view").control;
    assert_eq!(mirrored.x, 592.0);
    assert_eq!(mirrored.y, 392.0);
}

#[test]
fn a_short_press_toggles_the_panel_instead_of_dragging() {
    let temp = tempdir().expect("tempdir");
    let bus = open_bus(temp.path());

    let mut overlay = Replica::new(SurfaceKind::Overlay, bus.clone(), VIEWPORT);
    overlay.mount();
    assert!(!overlay.panel_open());

    let control = overlay.view().expect("mounted view").control;
    let press = Point {
        x: control.x + 10.0,
        y: control.y + 10.0,
    };
    overlay.control_pointer_down(3, press);
    // Wiggle under the threshold, then release.
    overlay.control_pointer_move(
        3,
        Point {
            x: press.x + 2.0,
            y: press.y + 1.0,
        },
    );
    overlay.control_pointer_up(3, press);

    assert!(overlay.panel_open());
    assert_eq!(bus.read::<bool>(keys::PANEL_OPEN), Some(true));
    assert!(bus.get(keys::CONTROL_POS).is_none(), "a click never moves it");
}
