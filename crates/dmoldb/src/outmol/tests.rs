use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn opt() {
    let got = read_output("testfiles/dmol/opt.outmol").unwrap();
    assert!(got.is_complete());
    assert_eq!(got.functional, "PBE");
    assert_eq!(got.mol.len(), 3);
    assert_eq!(got.mol.formula(), "H2O");
    assert_abs_diff_eq!(got.mol.atoms[1].y, 0.7572);
    // the first, superseded optimization section must not win
    assert_abs_diff_eq!(got.energy().unwrap(), -75.123456 * HARTREE_EV);
    assert_abs_diff_eq!(got.params["HOMO_DFT"], -0.19 * HARTREE_EV);
    assert_abs_diff_eq!(got.params["LUMO_DFT"], -0.08 * HARTREE_EV);
    assert_abs_diff_eq!(
        got.params["GAP_DFT"],
        (-0.08 - -0.19) * HARTREE_EV,
        epsilon = 1e-10
    );
    assert_abs_diff_eq!(got.params["Max_Force"], 0.004 * AU_FORCE_EV_ANG);
}

#[test]
fn eigenvalues() {
    let got = read_eigenvalues("testfiles/dmol/opt.outmol").unwrap();
    assert_eq!(got.len(), 4);
    assert_eq!(got[0], (-512.802680, 2.0));
    assert_eq!(got[2], (-5.170280, 2.0));
    assert_eq!(got[3], (-2.176960, 0.0));
}

#[test]
fn missing_sections() {
    let dir = tempfile::tempdir().unwrap();
    let junk = dir.path().join("junk.outmol");
    std::fs::write(&junk, "no optimization here\n").unwrap();
    assert!(matches!(
        read_output(&junk),
        Err(ExtractError::OptNotFound(_))
    ));
    // an absent eigenvalue table is a skip, not an error
    assert_eq!(read_eigenvalues(&junk).unwrap(), vec![]);

    let absent = dir.path().join("absent.outmol");
    assert!(matches!(
        read_output(&absent),
        Err(ExtractError::FileNotFound(_))
    ));
}

#[test]
fn no_energy() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("empty.outmol");
    std::fs::write(
        &p,
        "            Total Energy           Binding E       Cnvgnce     Time   Iter
 the run died before printing anything useful
",
    )
    .unwrap();
    assert!(matches!(
        read_output(&p),
        Err(ExtractError::EnergyNotFound(_))
    ));
}

#[test]
fn malformed_coordinate() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.outmol");
    std::fs::write(
        &p,
        "            Total Energy           Binding E       Cnvgnce     Time   Iter
opt==  Ef   -75.0Ha   -0.3Ha   0.001   1.0m   1
 Final Coordinates (Angstroms)
   ATOM        X          Y          Z
  ----------------------------------------
    1  O     0.000000   bogus      0.117300
  ----------------------------------------
",
    )
    .unwrap();
    assert!(matches!(read_output(&p), Err(ExtractError::GeomParse(_))));
}
