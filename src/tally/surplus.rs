use super::CandidateId;
use itertools::Itertools;

/// Split `surplus` whole papers between sub-parcels of transferable papers,
/// given in registration order as `(destination, papers)`.
///
/// If the sub-parcels hold no more papers than the surplus, every paper
/// moves. Otherwise each destination gets `floor(surplus * papers / total)`
/// and the papers left over go one each to the largest remainders, then the
/// larger sub-parcel, then the earlier destination.
pub(crate) fn apportion(surplus: u64, parcels: &[(CandidateId, u64)]) -> Vec<u64> {
    let transferable: u64 = parcels.iter().map(|(_, papers)| papers).sum();
    if transferable <= surplus {
        return parcels.iter().map(|(_, papers)| *papers).collect();
    }

    let mut shares: Vec<u64> = parcels
        .iter()
        .map(|(_, papers)| surplus * papers / transferable)
        .collect();
    let leftover = surplus - shares.iter().sum::<u64>();

    let by_remainder = parcels
        .iter()
        .enumerate()
        .map(|(index, (_, papers))| (index, surplus * papers % transferable, *papers))
        .sorted_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
    for (index, _, _) in by_remainder.take(leftover as usize) {
        shares[index] += 1;
    }

    shares
}
